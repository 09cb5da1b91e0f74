use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::conflicts::ConflictReport;
use crate::domain::CMDMode;
use crate::model::{Model, ViewState};

pub const STATUSLINE_HEIGHT: u16 = 1;
pub const TITLE_HEIGHT: u16 = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const INDEX_HEADER: &str = "#";
pub const MISSING_VALUE: &str = "-";
const MAX_CONFLICT_ROWS: usize = 8;
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let area = frame.area();
        let conflicts = model.conflicts();
        let conflict_height = if conflicts.is_empty() {
            0
        } else {
            // borders + header + rows
            (conflicts.len().min(MAX_CONFLICT_ROWS) + 3) as u16
        };
        let [title_area, conflict_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT),
            Constraint::Length(conflict_height),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(area);

        frame.render_widget(title_line(model), title_area);
        if !conflicts.is_empty() {
            draw_conflicts(frame, conflicts, conflict_area);
        }
        self.draw_table(model, frame, table_area);
        draw_statusline(model, frame, status_area);

        if let Some(message) = model.popup_message() {
            draw_popup(frame, message, area);
        }
    }

    fn draw_table(&mut self, model: &Model, frame: &mut Frame, area: Rect) {
        let view = model.view();
        if view.is_empty() {
            let text = match model.state() {
                ViewState::Empty => "No data loaded. Press o to open a CSV file.",
                _ => "No rows match the current search.",
            };
            frame.render_widget(
                Paragraph::new(text).centered().block(Block::bordered()),
                area,
            );
            return;
        }

        let (cursor_row, cursor_column) = model.cursor();
        let widths = column_widths(model);
        let index_width = view.len().to_string().len().max(INDEX_HEADER.len());
        let first_column = first_visible_column(
            &widths,
            cursor_column,
            (area.width as usize).saturating_sub(index_width + 3),
        );
        let sort = model.query().sort.as_ref();

        let header = Row::new(
            std::iter::once(Cell::from(INDEX_HEADER)).chain(
                view.columns[first_column..].iter().map(|c| {
                    let mut label = c.clone();
                    if let Some(s) = sort.filter(|s| &s.column == c) {
                        label = format!("{label} {}", s.direction.arrow());
                    }
                    Cell::from(label)
                }),
            ),
        )
        .style(Style::new().bold().underlined());

        let rows = view.rows.iter().enumerate().map(|(idx, record)| {
            let cells = std::iter::once(Cell::from((idx + 1).to_string()).dim()).chain(
                view.columns[first_column..].iter().map(|c| {
                    let value = record.value(c);
                    Cell::from(if value.is_empty() { MISSING_VALUE } else { value })
                }),
            );
            let row = Row::new(cells);
            if model.is_highlighted(record) {
                row.style(Style::new().fg(Color::Black).bg(Color::Yellow))
            } else {
                row
            }
        });

        let constraints = std::iter::once(Constraint::Length(index_width as u16)).chain(
            widths[first_column..]
                .iter()
                .map(|&w| Constraint::Length(w as u16)),
        );

        let title = match model.source_name() {
            Some(name) => format!(" {name} "),
            None => String::new(),
        };
        let table = Table::new(rows, constraints)
            .header(header)
            .block(Block::bordered().title(title))
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::new().bold().fg(Color::Cyan));

        self.table_state.select(Some(cursor_row));
        self.table_state
            .select_column(Some(cursor_column - first_column + 1));
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }
}

fn title_line(model: &Model) -> Paragraph<'static> {
    let query = model.query();
    let mut spans = vec![" ctv ".bold().reversed(), " ".into()];
    if model.state() != ViewState::Empty {
        spans.push(format!("{} of {} rows", model.view().len(), model.dataset().len()).into());
        spans.push(" │ ".dim());
        spans.push(query.filter_mode.to_string().cyan());
        if !query.search_text.is_empty() {
            spans.push(" │ search: ".dim());
            spans.push(format!("\"{}\"", query.search_text).yellow());
        }
        if !query.highlighted.is_empty() {
            spans.push(format!(" │ {} highlighted", query.highlighted.len()).dim());
        }
    }
    if model.can_dismiss_conflicts() {
        spans.push(" │ ".dim());
        spans.push("<x> close conflicts".red());
    }
    Paragraph::new(Line::from(spans))
}

fn draw_conflicts(frame: &mut Frame, conflicts: &ConflictReport, area: Rect) {
    let rows = conflicts.iter().enumerate().map(|(idx, c)| {
        Row::new(vec![
            Cell::from((idx + 1).to_string()),
            Cell::from(c.key.clone()),
            Cell::from(c.joined_values()),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Percentage(30),
            Constraint::Fill(1),
        ],
    )
    .header(Row::new(vec!["#", "Name", "Professions"]).bold())
    .block(
        Block::bordered()
            .title(" Conflicting Names and Professions ")
            .border_style(Style::new().red()),
    );
    frame.render_widget(table, area);
}

fn draw_statusline(model: &Model, frame: &mut Frame, area: Rect) {
    if let Some((mode, input)) = model.cmd_input() {
        let prompt = match mode {
            CMDMode::Search => "/",
            CMDMode::OpenFile => "open: ",
        };
        let line = Line::from(vec![prompt.bold(), Span::raw(input.input.clone())]);
        frame.render_widget(Paragraph::new(line), area);
        let x = area.x + (prompt.chars().count() + input.cursor_pos) as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        return;
    }

    let message = Span::raw(model.status_message().to_string());
    let message = if model.last_status_message_update().elapsed() > STATUS_MESSAGE_TTL {
        message.dim()
    } else {
        message
    };
    frame.render_widget(Paragraph::new(Line::from(message)), area);
}

fn draw_popup(frame: &mut Frame, message: &str, area: Rect) {
    let height = (message.lines().count() + 2) as u16;
    let width = message.lines().map(|l| l.chars().count()).max().unwrap_or(0) as u16 + 4;
    let popup = centered(area, width, height);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(message.to_string())
            .wrap(Wrap { trim: false })
            .block(Block::bordered().title(" Help ")),
        popup,
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Widest of header and values per column, capped at the configured maximum
/// and at what a `Constraint::Length` can hold.
fn column_widths(model: &Model) -> Vec<usize> {
    let view = model.view();
    let max_width = model.max_column_width();
    let sort_marker = 2;
    view.columns
        .iter()
        .map(|c| {
            let widest_value = view
                .rows
                .iter()
                .map(|r| r.value(c).chars().count())
                .max()
                .unwrap_or(0)
                .max(MISSING_VALUE.len());
            let width = widest_value.max(c.chars().count() + sort_marker) + COLUMN_WIDTH_MARGIN;
            width.min(max_width).min(u16::MAX as usize)
        })
        .collect()
}

/// Left most column to render so the selected column fits into `budget`.
fn first_visible_column(widths: &[usize], selected: usize, budget: usize) -> usize {
    let mut first = selected.min(widths.len().saturating_sub(1));
    let mut used = widths.get(first).copied().unwrap_or(0);
    while first > 0 && used + widths[first - 1] + 1 <= budget {
        first -= 1;
        used += widths[first] + 1;
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TVConfig;
    use crate::persistence::NoPersistence;
    use crate::record::Record;
    use ratatui::{Terminal, backend::TestBackend};

    fn model() -> Model {
        let mut model = Model::init(&TVConfig::default(), Box::new(NoPersistence));
        let rows: Vec<Record> = vec![
            [("name", "Merlin"), ("profession", "Wizard")].into_iter().collect(),
            [("name", "Merlin"), ("profession", "Druid")].into_iter().collect(),
            [("name", "Arthur"), ("profession", "")].into_iter().collect(),
        ];
        model.load(rows, Some("camelot.csv".into())).unwrap();
        model
    }

    fn render(model: &Model) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        let mut ui = TableUI::new();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn renders_rows_and_missing_values() {
        let screen = render(&model());
        assert!(screen.contains("camelot.csv"));
        assert!(screen.contains("Merlin"));
        assert!(screen.contains("Druid"));
        assert!(screen.contains("Arthur  "));
        assert!(screen.contains(" - "));
    }

    #[test]
    fn renders_conflict_table() {
        let mut model = model();
        model.run_conflict_check();
        let screen = render(&model);
        assert!(screen.contains("Conflicting Names and Professions"));
        assert!(screen.contains("Wizard, Druid"));
        assert!(screen.contains("close conflicts"));
    }

    #[test]
    fn empty_model_shows_hint() {
        let model = Model::init(&TVConfig::default(), Box::new(NoPersistence));
        assert!(render(&model).contains("No data loaded"));
    }

    #[test]
    fn column_widths_fit_in_terminal_units() {
        let config = TVConfig::default().max_column_width(usize::MAX);
        let mut model = Model::init(&config, Box::new(NoPersistence));
        let long_value = "x".repeat(70_000);
        let rows: Vec<Record> = vec![
            [("name", long_value.as_str()), ("profession", "Scribe")].into_iter().collect(),
        ];
        model.load(rows, None).unwrap();
        let widths = column_widths(&model);
        assert_eq!(widths[0], u16::MAX as usize);
        assert_eq!(widths[1], "profession".len() + 2 + COLUMN_WIDTH_MARGIN);
    }

    #[test]
    fn first_visible_column_keeps_selection_in_budget() {
        let widths = [10, 10, 10, 10];
        assert_eq!(first_visible_column(&widths, 0, 25), 0);
        assert_eq!(first_visible_column(&widths, 3, 25), 2);
        assert_eq!(first_visible_column(&widths, 3, 100), 0);
    }
}
