use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum CTVError {
    IoError(Error),
    StateFileError(serde_json::Error),
    LoadingFailed(String),
    ParseError(String),
    EmptyDataset,
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl fmt::Display for CTVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CTVError::IoError(e) => write!(f, "io error: {e}"),
            CTVError::StateFileError(e) => write!(f, "state file error: {e}"),
            CTVError::LoadingFailed(reason) => write!(f, "loading failed: {reason}"),
            CTVError::ParseError(reason) => write!(f, "not a valid table: {reason}"),
            CTVError::EmptyDataset => write!(f, "file contains no data"),
            CTVError::FileNotFound => write!(f, "file not found"),
            CTVError::PermissionDenied => write!(f, "permission denied"),
            CTVError::UnknownFileType => write!(f, "unknown file type"),
        }
    }
}

impl std::error::Error for CTVError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CTVError::IoError(e) => Some(e),
            CTVError::StateFileError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for CTVError {
    fn from(err: Error) -> Self {
        CTVError::IoError(err)
    }
}

/// Anything polars rejects while reading a file means the file is not a table.
impl From<PolarsError> for CTVError {
    fn from(err: PolarsError) -> Self {
        CTVError::ParseError(err.to_string())
    }
}

impl From<serde_json::Error> for CTVError {
    fn from(err: serde_json::Error) -> Self {
        CTVError::StateFileError(err)
    }
}

#[derive(Debug, Clone, Setters)]
pub struct TVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub state_file: Option<PathBuf>,
    pub file: Option<PathBuf>,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            state_file: None,
            file: None,
        }
    }
}

/// What a text prompt on the command line is used for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    OpenFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Exit,
    Enter,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Search,
    OpenFile,
    CycleFilter,
    SortColumn,
    CheckConflicts,
    DismissConflicts,
    ClearData,
    ToggleHighlight,
    CopyCell,
    CopyRow,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
q        quit
/        search all columns (live, Esc clears)
o        open a data file
f        cycle filter: all / unique names / unique professions
s        sort by selected column (again to flip direction)
c        find name and profession conflicts
x        close the conflicts table
D        clear data
space    highlight / unhighlight selected row
y / Y    copy cell / row
arrows   move, PgUp/PgDn page, g/G first/last row
?        this help, Esc closes";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(CTVError::EmptyDataset.to_string(), "file contains no data");
        assert_eq!(
            CTVError::ParseError("ragged row".into()).to_string(),
            "not a valid table: ragged row"
        );
    }

    #[test]
    fn error_from_io_keeps_source() {
        let err: CTVError = Error::other("boom").into();
        assert!(matches!(err, CTVError::IoError(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn polars_errors_become_parse_errors() {
        let err: CTVError = PolarsError::ColumnNotFound("name".into()).into();
        assert!(matches!(err, CTVError::ParseError(ref reason) if reason.contains("name")));
    }

    #[test]
    fn config_setters() {
        let cfg = TVConfig::default().event_poll_time(50).max_column_width(12);
        assert_eq!(cfg.event_poll_time, 50);
        assert_eq!(cfg.max_column_width, 12);
        assert!(cfg.state_file.is_none());
    }
}
