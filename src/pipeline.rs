//! Derives the visible rows and columns from a dataset and the query state.
//!
//! Stages run in a fixed order: search, then the categorical filter, then sort.
//! Search looks at the dataset columns, the filter may drop columns, and the
//! sort sees the rows as the filter left them.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::trace;

use crate::query::{FilterMode, QueryState, SortDirection, SortSpec};
use crate::record::{Dataset, NAME_COLUMN, PROFESSION_COLUMN, Record, columns_of};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedView {
    pub rows: Vec<Record>,
    pub columns: Vec<String>,
}

impl DerivedView {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn derive(dataset: &Dataset, query: &QueryState) -> DerivedView {
    let rows = search(&dataset.rows, &dataset.columns, &query.search_text);
    let rows = filter(rows, query.filter_mode);
    let rows = sort(rows, query.sort.as_ref());
    let columns = columns_of(&rows);
    trace!(
        "Derived {} of {} rows, {} columns",
        rows.len(),
        dataset.len(),
        columns.len()
    );
    DerivedView { rows, columns }
}

/// Keeps rows where any of `columns` contains `term`, ignoring case.
pub fn search(rows: &[Record], columns: &[String], term: &str) -> Vec<Record> {
    if term.is_empty() {
        return rows.to_vec();
    }
    let needle = term.to_lowercase();
    rows.iter()
        .filter(|row| {
            columns.iter().any(|c| {
                row.get(c)
                    .is_some_and(|v| v.to_lowercase().contains(&needle))
            })
        })
        .cloned()
        .collect()
}

pub fn filter(rows: Vec<Record>, mode: FilterMode) -> Vec<Record> {
    match mode {
        FilterMode::All => rows,
        FilterMode::UniqueByName => {
            let mut seen = HashSet::new();
            rows.iter()
                .filter(|row| seen.insert(row.value(NAME_COLUMN)))
                .map(|row| {
                    [
                        (NAME_COLUMN, row.value(NAME_COLUMN)),
                        (PROFESSION_COLUMN, row.value(PROFESSION_COLUMN)),
                    ]
                    .into_iter()
                    .collect()
                })
                .collect()
        }
        FilterMode::UniqueByProfession => {
            let mut seen = HashSet::new();
            rows.iter()
                .filter(|row| seen.insert(row.value(PROFESSION_COLUMN)))
                .map(|row| {
                    [(PROFESSION_COLUMN, row.value(PROFESSION_COLUMN))]
                        .into_iter()
                        .collect()
                })
                .collect()
        }
    }
}

pub fn sort(rows: Vec<Record>, spec: Option<&SortSpec>) -> Vec<Record> {
    match spec {
        None => rows,
        Some(spec) => merge_sort_by(rows, &|a: &Record, b: &Record| {
            compare_values(a.value(&spec.column), b.value(&spec.column), spec.direction)
        }),
    }
}

/// Empty values go last in both directions. Otherwise values whose part before
/// the first '.' parses as a number on both sides compare numerically
/// (so "2.csv" < "10.csv"), the rest compare as text.
///
/// The numeric rule applies to every column, so any text starting with digits
/// is ordered by that number.
pub fn compare_values(a: &str, b: &str, direction: SortDirection) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let ordering = match (numeric_prefix(a), numeric_prefix(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => locale_cmp(a, b),
    };
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn numeric_prefix(value: &str) -> Option<f64> {
    let prefix = value.split('.').next().unwrap_or("").trim();
    // Rejects "inf", "NaN" and friends, which f64 parsing would accept.
    if !prefix.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse::<f64>().ok()
}

/// Collation in three levels: base letters ignoring accents and case, then
/// accents, then case with lowercase first.
fn locale_cmp(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| b.cmp(a))
}

fn collation_key(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars()
        .flat_map(|ch| strip_diacritic(ch).to_lowercase())
}

fn strip_diacritic(ch: char) -> char {
    match ch {
        '\u{00C0}'..='\u{00C6}' => 'A',
        '\u{00E0}'..='\u{00E6}' => 'a',
        '\u{00C7}' => 'C',
        '\u{00E7}' => 'c',
        '\u{00C8}'..='\u{00CB}' => 'E',
        '\u{00E8}'..='\u{00EB}' => 'e',
        '\u{00CC}'..='\u{00CF}' => 'I',
        '\u{00EC}'..='\u{00EF}' => 'i',
        '\u{00D1}' => 'N',
        '\u{00F1}' => 'n',
        '\u{00D2}'..='\u{00D6}' | '\u{00D8}' => 'O',
        '\u{00F2}'..='\u{00F6}' | '\u{00F8}' => 'o',
        '\u{00D9}'..='\u{00DC}' => 'U',
        '\u{00F9}'..='\u{00FC}' => 'u',
        '\u{00DD}' => 'Y',
        '\u{00FD}' | '\u{00FF}' => 'y',
        _ => ch,
    }
}

// Stable merge sort. The comparator mixes numeric and text ordering and is not
// guaranteed to be a total order, which `slice::sort_by` may reject.
fn merge_sort_by<T, F>(mut items: Vec<T>, cmp: &F) -> Vec<T>
where
    F: Fn(&T, &T) -> Ordering,
{
    if items.len() <= 1 {
        return items;
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort_by(items, cmp);
    let right = merge_sort_by(right, cmp);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => cmp(r, l) != Ordering::Less,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    fn characters() -> Dataset {
        Dataset::from_rows(vec![
            rec(&[("file", "10.csv"), ("name", "Merlin"), ("profession", "Wizard")]),
            rec(&[("file", "2.csv"), ("name", "Arthur"), ("profession", "King")]),
            rec(&[("file", "1.csv"), ("name", "Merlin"), ("profession", "Druid")]),
            rec(&[("file", ""), ("name", "Lancelot"), ("profession", "Knight")]),
            rec(&[("file", "3.csv"), ("name", "Gawain"), ("profession", "Knight")]),
        ])
    }

    fn column(view: &DerivedView, c: &str) -> Vec<String> {
        view.rows.iter().map(|r| r.value(c).to_string()).collect()
    }

    fn sorted_by(column: &str, direction: SortDirection) -> QueryState {
        QueryState {
            sort: Some(SortSpec::new(column, direction)),
            ..Default::default()
        }
    }

    #[test]
    fn default_query_is_identity() {
        let ds = characters();
        let view = derive(&ds, &QueryState::default());
        assert_eq!(view.rows, ds.rows);
        assert_eq!(view.columns, ds.columns);
    }

    #[test]
    fn empty_dataset_has_no_columns() {
        let view = derive(&Dataset::default(), &QueryState::default());
        assert!(view.is_empty());
        assert!(view.columns.is_empty());
    }

    #[test]
    fn search_is_case_insensitive_over_all_columns() {
        let ds = characters();
        let q = QueryState {
            search_text: "KNI".into(),
            ..Default::default()
        };
        let view = derive(&ds, &q);
        assert_eq!(column(&view, "name"), vec!["Lancelot", "Gawain"]);

        let q = QueryState {
            search_text: "2.c".into(),
            ..Default::default()
        };
        assert_eq!(column(&derive(&ds, &q), "name"), vec!["Arthur"]);
    }

    #[test]
    fn search_skips_missing_columns() {
        let rows = vec![
            rec(&[("name", "A"), ("profession", "Wizard")]),
            rec(&[("name", "B")]),
        ];
        let columns = vec!["name".to_string(), "profession".to_string()];
        let found = search(&rows, &columns, "wiz");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value("name"), "A");
    }

    #[test]
    fn unique_by_name_keeps_first_profession() {
        let ds = Dataset::from_rows(vec![
            rec(&[("name", "A"), ("profession", "X"), ("file", "1.csv")]),
            rec(&[("name", "A"), ("profession", "Y"), ("file", "2.csv")]),
            rec(&[("name", "B"), ("profession", "Z"), ("file", "3.csv")]),
        ]);
        let q = QueryState {
            filter_mode: FilterMode::UniqueByName,
            ..Default::default()
        };
        let view = derive(&ds, &q);
        assert_eq!(view.len(), 2);
        assert_eq!(view.rows[0], rec(&[("name", "A"), ("profession", "X")]));
        assert_eq!(view.rows[1], rec(&[("name", "B"), ("profession", "Z")]));
        assert_eq!(view.columns, vec!["name", "profession"]);
    }

    #[test]
    fn unique_by_profession_drops_name() {
        let q = QueryState {
            filter_mode: FilterMode::UniqueByProfession,
            ..Default::default()
        };
        let view = derive(&characters(), &q);
        assert_eq!(column(&view, "profession"), vec!["Wizard", "King", "Druid", "Knight"]);
        assert_eq!(view.columns, vec!["profession"]);
        assert!(view.rows.iter().all(|r| r.get("name").is_none()));
    }

    #[test]
    fn search_runs_before_filter() {
        let q = QueryState {
            search_text: "merlin".into(),
            filter_mode: FilterMode::UniqueByProfession,
            ..Default::default()
        };
        let view = derive(&characters(), &q);
        assert_eq!(column(&view, "profession"), vec!["Wizard", "Druid"]);
    }

    #[test]
    fn numeric_prefix_sort() {
        let ds = Dataset::from_rows(vec![
            rec(&[("file", "10.csv")]),
            rec(&[("file", "2.csv")]),
            rec(&[("file", "1.csv")]),
        ]);
        let view = derive(&ds, &sorted_by("file", SortDirection::Ascending));
        assert_eq!(column(&view, "file"), vec!["1.csv", "2.csv", "10.csv"]);
    }

    #[test]
    fn empty_values_sort_last_in_both_directions() {
        let ds = characters();
        let asc = derive(&ds, &sorted_by("file", SortDirection::Ascending));
        assert_eq!(column(&asc, "file"), vec!["1.csv", "2.csv", "3.csv", "10.csv", ""]);
        let desc = derive(&ds, &sorted_by("file", SortDirection::Descending));
        assert_eq!(column(&desc, "file"), vec!["10.csv", "3.csv", "2.csv", "1.csv", ""]);
    }

    #[test]
    fn text_sort_ignores_case() {
        let ds = Dataset::from_rows(vec![
            rec(&[("name", "merlin")]),
            rec(&[("name", "Arthur")]),
            rec(&[("name", "gawain")]),
        ]);
        let view = derive(&ds, &sorted_by("name", SortDirection::Ascending));
        assert_eq!(column(&view, "name"), vec!["Arthur", "gawain", "merlin"]);
    }

    #[test]
    fn accented_text_sorts_with_its_base_letter() {
        let ds = Dataset::from_rows(vec![
            rec(&[("name", "Zoe")]),
            rec(&[("name", "Émile")]),
            rec(&[("name", "Arthur")]),
            rec(&[("name", "emile")]),
            rec(&[("name", "Emile")]),
        ]);
        let view = derive(&ds, &sorted_by("name", SortDirection::Ascending));
        assert_eq!(
            column(&view, "name"),
            vec!["Arthur", "emile", "Emile", "Émile", "Zoe"]
        );
    }

    #[test]
    fn words_parsed_as_floats_are_text() {
        use SortDirection::*;
        assert_eq!(compare_values("Inf", "infinity", Ascending), Ordering::Less);
        assert_eq!(compare_values("NaN", "10", Ascending), Ordering::Greater);
        assert_eq!(compare_values("-3", "2", Ascending), Ordering::Less);
    }

    #[test]
    fn sort_is_stable() {
        let ds = characters();
        let view = derive(&ds, &sorted_by("profession", SortDirection::Ascending));
        assert_eq!(
            column(&view, "name"),
            vec!["Merlin", "Arthur", "Lancelot", "Gawain", "Merlin"]
        );
        let desc = derive(&ds, &sorted_by("profession", SortDirection::Descending));
        assert_eq!(
            column(&desc, "name"),
            vec!["Merlin", "Lancelot", "Gawain", "Arthur", "Merlin"]
        );
    }

    #[test]
    fn sort_on_missing_column_keeps_order() {
        let ds = characters();
        let view = derive(&ds, &sorted_by("age", SortDirection::Descending));
        assert_eq!(view.rows, ds.rows);
    }

    #[test]
    fn reapplying_a_query_changes_nothing() {
        let q = QueryState {
            search_text: "r".into(),
            filter_mode: FilterMode::UniqueByName,
            sort: Some(SortSpec::new("name", SortDirection::Descending)),
            ..Default::default()
        };
        let first = derive(&characters(), &q);
        let second = derive(&Dataset::from_rows(first.rows.clone()), &q);
        assert_eq!(first, second);
    }

    #[test]
    fn compare_values_rules() {
        use SortDirection::*;
        assert_eq!(compare_values("", "a", Descending), Ordering::Greater);
        assert_eq!(compare_values("a", "", Descending), Ordering::Less);
        assert_eq!(compare_values("9", "10", Ascending), Ordering::Less);
        assert_eq!(compare_values("9", "10", Descending), Ordering::Greater);
        assert_eq!(compare_values("1.5", "1.9", Ascending), Ordering::Equal);
        assert_eq!(compare_values(".hidden", "2.csv", Ascending), Ordering::Less);
    }
}
