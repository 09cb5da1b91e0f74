use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::domain::CTVError;
use crate::record::Record;

#[derive(Debug, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    file_type: FileType,
}

impl FileInfo {
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }
}

/// A column with every value rendered as a string. Nulls are empty strings.
struct Column {
    name: String,
    data: Vec<String>,
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, CTVError> {
    let expanded = shellexpand::full(raw.trim())
        .map_err(|e| CTVError::LoadingFailed(format!("cannot expand path {raw}: {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Reads a data file into records. The first row's column order is kept for
/// every record.
pub fn load_data_file(path: PathBuf) -> Result<(FileInfo, Vec<Record>), CTVError> {
    let file_info = get_file_info(path)?;
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path),
        FileType::PARQUET => load_parquet(&file_info.path),
        FileType::ARROW => load_arrow(&file_info.path),
    };

    let start_time = Instant::now();
    let df = frame.and_then(LazyFrame::collect)?;
    let records = frame_to_records(&df)?;
    info!(
        "Read {} rows from {:?} ({} bytes) in {}ms",
        records.len(),
        file_info.path,
        file_info.file_size,
        start_time.elapsed().as_millis()
    );
    Ok((file_info, records))
}

/// Each column is converted in its own rayon task, then rows are assembled.
/// Rows where every value is empty are skipped.
pub fn frame_to_records(df: &DataFrame) -> Result<Vec<Record>, PolarsError> {
    let names = df.get_column_names();
    let columns: Vec<Column> = names
        .par_iter()
        .map(|name| load_column(df, name.as_str()))
        .collect::<Result<_, _>>()?;
    for c in columns.iter() {
        debug!("Column \"{}\", # rows {}", c.name, c.data.len());
    }

    let records: Vec<Record> = (0..df.height())
        .map(|ridx| {
            columns
                .iter()
                .map(|c| (c.name.as_str(), c.data[ridx].as_str()))
                .collect::<Record>()
        })
        .filter(|r| r.values().any(|v| !v.is_empty()))
        .collect();
    trace!("Assembled {} of {} rows", records.len(), df.height());
    Ok(records)
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<Column, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect();
    Ok(Column {
        name: col_name.to_string(),
        data,
    })
}

fn detect_file_type(path: &Path) -> Result<FileType, CTVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(CTVError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, CTVError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CTVError::FileNotFound,
        ErrorKind::PermissionDenied => CTVError::PermissionDenied,
        _ => CTVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(CTVError::LoadingFailed("Not a file!".into()));
    }

    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size: metadata.len(),
        file_type,
    })
}

// Schema inference is off so every cell keeps its literal text ("007", "1.50").
fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn reads_csv_fixture_as_strings() {
        let (info, records) = load_data_file(fixture("characters.csv")).unwrap();
        assert_eq!(info.display_name(), "characters.csv");
        assert_eq!(records.len(), 6);
        let columns: Vec<&str> = records[0].columns().collect();
        assert_eq!(columns, vec!["file", "name", "profession"]);
        assert_eq!(records[0].value("file"), "10.csv");
        assert_eq!(records[0].value("name"), "Merlin");
        assert_eq!(records[3].value("file"), "");
    }

    #[test]
    fn numbers_keep_their_text() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,score\n007,1.50\n12,3").unwrap();
        let (_, records) = load_data_file(file.path().to_path_buf()).unwrap();
        assert_eq!(records[0].value("id"), "007");
        assert_eq!(records[0].value("score"), "1.50");
    }

    #[test]
    fn header_only_csv_has_no_records() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "name,profession").unwrap();
        let (_, records) = load_data_file(file.path().to_path_buf()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            load_data_file(file.path().to_path_buf()),
            Err(CTVError::UnknownFileType)
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            load_data_file(fixture("does-not-exist.csv")),
            Err(CTVError::FileNotFound)
        ));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_data_file(dir.path().to_path_buf()),
            Err(CTVError::LoadingFailed(_))
        ));
    }

    #[test]
    fn expand_path_trims_and_expands() {
        let path = expand_path("  /tmp/data.csv ").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/data.csv"));
    }
}
