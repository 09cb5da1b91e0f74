use arboard::Clipboard;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::conflicts::{ConflictOutcome, ConflictReport, detect_conflicts};
use crate::domain::{CMDMode, CTVError, HELP_TEXT, Message, TVConfig};
use crate::ingest;
use crate::inputter::{InputResult, Inputter};
use crate::persistence::Persistence;
use crate::pipeline::{DerivedView, derive};
use crate::query::{FilterMode, QueryState, SortSpec};
use crate::record::{Dataset, Record};
use crate::store::RowStore;

pub const NO_CONFLICTS_MESSAGE: &str = "Same names have the same professions.";

#[derive(Debug, PartialEq)]
pub enum Status {
    RUNNING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

/// Where the view controller stands. The conflict table is an overlay on top
/// of `Loaded` or `Filtered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Empty,
    Loaded { conflicts_shown: bool },
    Filtered { conflicts_shown: bool },
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    store: RowStore,
    query: QueryState,
    view: DerivedView,
    conflicts: ConflictReport,
    persistence: Box<dyn Persistence>,
    source_name: Option<String>,
    cursor_row: usize,
    cursor_column: usize,
    page_height: usize,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    popup_message: String,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    /// Creates the controller and restores the last saved dataset, if any.
    pub fn init(config: &TVConfig, persistence: Box<dyn Persistence>) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::RUNNING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            store: RowStore::new(),
            query: QueryState::default(),
            view: DerivedView::default(),
            conflicts: ConflictReport::new(),
            persistence,
            source_name: None,
            cursor_row: 0,
            cursor_column: 0,
            page_height: 20,
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            popup_message: String::new(),
            status_message: "Started ctv! Press o to open a file, ? for help.".to_string(),
            last_status_message_update: Instant::now(),
        };
        match model.persistence.restore() {
            Ok(Some(dataset)) => {
                info!("Restored {} rows from the last session", dataset.len());
                model.store.replace(dataset);
                model.source_name = Some("restored".to_string());
                model.set_status_message(format!(
                    "Restored {} rows from the last session",
                    model.store.dataset().len()
                ));
            }
            Ok(None) => debug!("No saved dataset to restore"),
            Err(e) => warn!("Restoring the saved dataset failed: {e}"),
        }
        model.recompute();
        model
    }

    // -------------------- State transitions ---------------------- //

    /// Replaces the dataset and resets every derived and query state.
    /// Empty input is a no-op that leaves all state untouched.
    pub fn load(&mut self, rows: Vec<Record>, source_name: Option<String>) -> Result<(), CTVError> {
        let nrows = rows.len();
        if let Err(e) = self.store.load(rows) {
            self.set_status_message("Uploaded file contains no data.");
            return Err(e);
        }
        self.reset_derived_state();
        self.source_name = source_name;
        self.recompute();

        if let Err(e) = self.persistence.save(self.store.dataset()) {
            warn!("Saving the dataset failed: {e}");
        }
        info!("Loaded {nrows} rows");
        self.set_status_message(format!("Loaded {nrows} rows"));
        Ok(())
    }

    pub fn load_data_file(&mut self, path: PathBuf) -> Result<(), CTVError> {
        let result = ingest::load_data_file(path.clone()).and_then(|(file_info, records)| {
            self.load(records, Some(file_info.display_name()))
        });
        match &result {
            Ok(()) => {}
            Err(CTVError::EmptyDataset) => warn!("{path:?} contains no data"),
            Err(e) => {
                error!("Loading {path:?} failed: {e}");
                self.set_status_message(format!("Please choose a valid data file: {e}"));
            }
        }
        result
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.source_name = None;
        self.reset_derived_state();
        if let Err(e) = self.persistence.clear() {
            warn!("Clearing the saved dataset failed: {e}");
        }
        self.recompute();
        self.set_status_message("Cleared data");
    }

    pub fn set_search(&mut self, text: &str) {
        self.query.search_text = text.to_string();
        self.recompute();
    }

    /// Switching the filter mode also drops search text and sort.
    pub fn set_filter(&mut self, mode: FilterMode) {
        self.query.set_filter_mode(mode);
        self.recompute();
        self.set_status_message(format!("Showing {mode}"));
    }

    pub fn cycle_filter(&mut self) {
        self.set_filter(self.query.filter_mode.next());
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.query.sort = sort;
        self.recompute();
    }

    /// Column header activation.
    pub fn sort_by_column(&mut self, column: &str) {
        self.query.activate_sort_column(column);
        self.recompute();
    }

    pub fn run_conflict_check(&mut self) -> ConflictOutcome {
        let outcome = detect_conflicts(self.store.dataset());
        match &outcome {
            ConflictOutcome::Found(report) => {
                info!("Found {} conflicting names", report.len());
                self.conflicts = report.clone();
                self.set_status_message(format!(
                    "Found {} conflicting names and professions",
                    report.len()
                ));
            }
            ConflictOutcome::NoConflicts => {
                info!("{NO_CONFLICTS_MESSAGE}");
                self.set_status_message(NO_CONFLICTS_MESSAGE);
            }
            ConflictOutcome::NoData => {
                self.set_status_message("No data loaded");
            }
        }
        outcome
    }

    /// Only available while a conflict report is shown.
    pub fn dismiss_conflicts(&mut self) -> bool {
        if !self.can_dismiss_conflicts() {
            trace!("No conflicts to dismiss");
            return false;
        }
        self.conflicts.clear();
        self.set_status_message("Closed conflicts table");
        true
    }

    pub fn can_dismiss_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn toggle_highlight(&mut self, id: &str) -> bool {
        let highlighted = self.query.toggle_highlight(id);
        trace!("Highlight {id:?}: {highlighted}");
        highlighted
    }

    /// Rebuilds the derived view. Called after every mutation.
    pub fn recompute(&mut self) {
        self.view = derive(self.store.dataset(), &self.query);
        self.clamp_cursor();
    }

    fn reset_derived_state(&mut self) {
        self.query = QueryState::default();
        self.conflicts.clear();
        self.input.clear();
        self.last_input = self.input.get();
        self.cursor_row = 0;
        self.cursor_column = 0;
    }

    // -------------------- Accessors ---------------------- //

    pub fn state(&self) -> ViewState {
        let conflicts_shown = !self.conflicts.is_empty();
        if self.store.is_empty() {
            ViewState::Empty
        } else if self.query.is_default_view() {
            ViewState::Loaded { conflicts_shown }
        } else {
            ViewState::Filtered { conflicts_shown }
        }
    }

    pub fn dataset(&self) -> &Dataset {
        self.store.dataset()
    }

    pub fn view(&self) -> &DerivedView {
        &self.view
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn conflicts(&self) -> &ConflictReport {
        &self.conflicts
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_column)
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.view.rows.get(self.cursor_row)
    }

    pub fn selected_column(&self) -> Option<&str> {
        self.view.columns.get(self.cursor_column).map(String::as_str)
    }

    pub fn is_highlighted(&self, record: &Record) -> bool {
        self.query.highlighted.contains(&record.id())
    }

    pub fn max_column_width(&self) -> usize {
        self.config.max_column_width
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn last_status_message_update(&self) -> Instant {
        self.last_status_message_update
    }

    pub fn popup_message(&self) -> Option<&str> {
        (self.modus == Modus::POPUP).then_some(self.popup_message.as_str())
    }

    /// The active prompt and its current content.
    pub fn cmd_input(&self) -> Option<(CMDMode, &InputResult)> {
        match (self.modus, self.cmd_mode) {
            (Modus::CMDINPUT, Some(mode)) => Some((mode, &self.last_input)),
            _ => None,
        }
    }

    /// While a prompt is open every key goes to the line editor.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    // -------------------- Event handling ---------------------- //

    pub fn update(&mut self, message: Option<Message>) -> Result<(), CTVError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_selection_up(1),
                Message::MoveDown => self.move_selection_down(1),
                Message::MoveLeft => self.cursor_column = self.cursor_column.saturating_sub(1),
                Message::MoveRight => self.move_selection_right(),
                Message::MovePageUp => self.move_selection_up(self.page_height),
                Message::MovePageDown => self.move_selection_down(self.page_height),
                Message::MoveBeginning => self.cursor_row = 0,
                Message::MoveEnd => self.cursor_row = self.view.len().saturating_sub(1),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Help => self.show_help(),
                Message::OpenFile => self.enter_cmd_mode(CMDMode::OpenFile),
                Message::Search if !self.store.is_empty() => {
                    self.enter_cmd_mode(CMDMode::Search)
                }
                Message::CycleFilter if !self.store.is_empty() => self.cycle_filter(),
                Message::SortColumn => {
                    if let Some(column) = self.selected_column().map(str::to_string) {
                        self.sort_by_column(&column);
                    }
                }
                Message::CheckConflicts if !self.store.is_empty() => {
                    self.run_conflict_check();
                }
                Message::DismissConflicts => {
                    self.dismiss_conflicts();
                }
                Message::ClearData if !self.store.is_empty() => self.clear(),
                Message::ToggleHighlight => {
                    if let Some(id) = self.selected_record().map(Record::id) {
                        self.toggle_highlight(&id);
                    }
                }
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Exit => {
                    self.dismiss_conflicts();
                }
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Exit | Message::Enter | Message::Help => self.exit_popup(),
                _ => (),
            },
            Modus::CMDINPUT => match msg {
                Message::RawKey(key) => self.raw_input(key),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }
        Ok(())
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!("UI was resized to w:{width}, h:{height}");
        // Header line, table header and status line.
        self.page_height = height.saturating_sub(4).max(1);
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn exit_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.popup_message.clear();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.input.clear();
        if mode == CMDMode::Search {
            self.input.set(&self.query.search_text);
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        self.last_input = self.input.read(key);
        // Search is live: the view follows every keystroke.
        if self.cmd_mode == Some(CMDMode::Search) && self.last_input.input != self.query.search_text
        {
            let text = self.last_input.input.clone();
            self.set_search(&text);
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode.take() {
            Some(CMDMode::Search) => {
                if !cmd_input.is_empty() {
                    self.set_status_message(format!("{} rows match \"{cmd_input}\"", self.view.len()));
                }
            }
            Some(CMDMode::OpenFile) if !self.last_input.canceled && !cmd_input.is_empty() => {
                match ingest::expand_path(&cmd_input) {
                    Ok(path) => {
                        // Failures are reported on the status line.
                        let _ = self.load_data_file(path);
                    }
                    Err(e) => self.set_status_message(e.to_string()),
                }
            }
            Some(CMDMode::OpenFile) => {}
            None => info!("Cmd mode is none!"),
        }
    }

    fn clamp_cursor(&mut self) {
        self.cursor_row = self.cursor_row.min(self.view.len().saturating_sub(1));
        self.cursor_column = self
            .cursor_column
            .min(self.view.columns.len().saturating_sub(1));
    }

    fn move_selection_up(&mut self, size: usize) {
        self.cursor_row = self.cursor_row.saturating_sub(size);
    }

    fn move_selection_down(&mut self, size: usize) {
        let last = self.view.len().saturating_sub(1);
        self.cursor_row = std::cmp::min(self.cursor_row + size, last);
    }

    fn move_selection_right(&mut self) {
        if self.cursor_column + 1 < self.view.columns.len() {
            self.cursor_column += 1;
        }
    }

    // -------------------- Clipboard ---------------------- //

    fn set_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(c) => self.clipboard = Some(c),
                Err(e) => {
                    warn!("Clipboard unavailable: {:?}", e);
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => trace!("Copied content to clipboard."),
                Err(e) => warn!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn copy_cell(&mut self) {
        let cell = match (self.selected_record(), self.selected_column()) {
            (Some(record), Some(column)) => record.value(column).to_string(),
            _ => return,
        };
        trace!("Cell content: {}", cell);
        self.set_clipboard(cell);
    }

    fn copy_row(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        let row_content = record_to_csv_line(record, &self.view.columns);
        self.set_clipboard(row_content);
    }
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',' || c == '"');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

pub fn record_to_csv_line(record: &Record, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| wrap_cell_content(record.value(c)))
        .collect::<Vec<String>>()
        .join(",")
}
