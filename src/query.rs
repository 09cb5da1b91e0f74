use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    All,
    UniqueByName,
    UniqueByProfession,
}

impl FilterMode {
    pub fn next(self) -> Self {
        match self {
            FilterMode::All => FilterMode::UniqueByName,
            FilterMode::UniqueByName => FilterMode::UniqueByProfession,
            FilterMode::UniqueByProfession => FilterMode::All,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterMode::All => "All Characters",
            FilterMode::UniqueByName => "Unique Characters",
            FilterMode::UniqueByProfession => "Unique Professions",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// User controls that shape the derived view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub search_text: String,
    pub filter_mode: FilterMode,
    pub sort: Option<SortSpec>,
    pub highlighted: HashSet<String>,
}

impl QueryState {
    /// True when search, filter and sort are all at their defaults.
    /// Highlights do not count.
    pub fn is_default_view(&self) -> bool {
        self.search_text.is_empty() && self.filter_mode == FilterMode::All && self.sort.is_none()
    }

    /// Changing the filter mode always drops search text and sort.
    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        self.filter_mode = mode;
        self.search_text.clear();
        self.sort = None;
    }

    /// Header activation: ascending first, a second activation of the same
    /// ascending column flips to descending.
    pub fn activate_sort_column(&mut self, column: &str) {
        let direction = match &self.sort {
            Some(s) if s.column == column && s.direction == SortDirection::Ascending => {
                SortDirection::Descending
            }
            _ => SortDirection::Ascending,
        };
        self.sort = Some(SortSpec::new(column, direction));
    }

    /// Returns true if the id is highlighted after the toggle.
    pub fn toggle_highlight(&mut self, id: &str) -> bool {
        if self.highlighted.remove(id) {
            false
        } else {
            self.highlighted.insert(id.to_string());
            true
        }
    }
}
