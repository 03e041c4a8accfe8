//! Log plotter: a checkbox list of attributes next to a chart of the checked
//! ones. The chart bounds follow whatever is checked.

use crate::data_source::LogTable;
use crate::gui::{enter_terminal, error::GuiError, leave_terminal};
use crate::signals;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{block::Title, *},
};
use std::time::Duration;

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
];

struct App {
    names: Vec<String>,
    /// First and last timestamp of the whole log. The time axis keeps this
    /// span whatever is checked.
    span: Option<(f64, f64)>,
    series: Vec<Vec<(f64, f64)>>,
    checked: Vec<bool>,
    list_state: ListState,
}

impl App {
    /// Checks the attributes named in `select`, or all of them if it is
    /// empty.
    fn new(table: &LogTable, select: &[String]) -> Result<Self, GuiError> {
        let names = table.attributes.clone();
        let checked = if select.is_empty() {
            vec![true; names.len()]
        } else {
            let mut checked = vec![false; names.len()];
            for name in select {
                let idx = names
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| GuiError::UnknownAttribute(name.clone()))?;
                checked[idx] = true;
            }
            checked
        };
        let series = names
            .iter()
            .map(|n| table.series(n).unwrap_or_default())
            .collect();
        Ok(Self {
            names,
            span: table.time_span(),
            series,
            checked,
            list_state: ListState::default().with_selected(Some(0)),
        })
    }

    fn cursor(&self) -> usize {
        self.list_state.selected().unwrap_or(0)
    }

    fn move_cursor(&mut self, down: bool) {
        let n = self.names.len();
        if n == 0 {
            return;
        }
        let cursor = self.cursor();
        let next = if down { (cursor + 1) % n } else { (cursor + n - 1) % n };
        self.list_state.select(Some(next));
    }

    fn toggle(&mut self) {
        let cursor = self.cursor();
        if let Some(c) = self.checked.get_mut(cursor) {
            *c = !*c;
        }
    }

    fn set_all(&mut self, value: bool) {
        self.checked.iter_mut().for_each(|c| *c = value);
    }

    fn x_bounds(&self) -> Option<[f64; 2]> {
        let (first, last) = self.span?;
        bounds([first, last].into_iter())
    }

    fn visible(&self) -> impl Iterator<Item = (usize, &Vec<(f64, f64)>)> {
        self.series
            .iter()
            .enumerate()
            .filter(|(i, _)| self.checked[*i])
    }
}

/// Shows `table` until the user quits.
pub fn plot(table: &LogTable, select: &[String]) -> Result<(), GuiError> {
    let app = App::new(table, select)?;
    let mut terminal = enter_terminal()?;
    let res = run_app(&mut terminal, app);
    leave_terminal(&mut terminal)?;
    res
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<(), GuiError> {
    loop {
        terminal.draw(|f| ui(f, &mut app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(())
                    }
                    KeyCode::Down | KeyCode::Char('j') => app.move_cursor(true),
                    KeyCode::Up | KeyCode::Char('k') => app.move_cursor(false),
                    KeyCode::Char(' ') | KeyCode::Enter => app.toggle(),
                    KeyCode::Char('a') => app.set_all(true),
                    KeyCode::Char('n') => app.set_all(false),
                    _ => {}
                }
            }
        }
        if signals::shutdown_requested() {
            return Ok(());
        }
    }
}

/// Padded `[min, max]` over some values. A flat series gets a band of one
/// unit around it so it does not sit on the frame.
fn bounds(values: impl Iterator<Item = f64>) -> Option<[f64; 2]> {
    let (lo, hi) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;
    if hi - lo < f64::EPSILON {
        Some([lo - 1.0, hi + 1.0])
    } else {
        let pad = 0.05 * (hi - lo);
        Some([lo - pad, hi + pad])
    }
}

fn labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = 0.5 * (bounds[0] + bounds[1]);
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|v| Span::from(format!("{:.2}", v)))
        .collect()
}

fn ui(f: &mut Frame, app: &mut App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(28), Constraint::Min(20)])
        .split(f.size());

    let items: Vec<ListItem> = app
        .names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mark = if app.checked[i] { "[x] " } else { "[ ] " };
            ListItem::new(Line::from(vec![
                mark.into(),
                Span::styled(name.clone(), Style::default().fg(PALETTE[i % PALETTE.len()])),
            ]))
        })
        .collect();
    let instructions = Title::from(Line::from(vec![
        " <Space> ".magenta().bold(),
        "toggle ".into(),
        "<Q> ".magenta().bold(),
    ]));
    let list = List::new(items)
        .block(
            Block::default()
                .title(" Attributes ".magenta().bold())
                .title(
                    instructions
                        .alignment(Alignment::Center)
                        .position(block::Position::Bottom),
                )
                .borders(Borders::ALL),
        )
        .highlight_symbol(">>")
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    f.render_stateful_widget(list, cols[0], &mut app.list_state);

    let x_bounds = app.x_bounds();
    let y_bounds = bounds(app.visible().flat_map(|(_, s)| s.iter().map(|p| p.1)));
    let (Some(x_bounds), Some(y_bounds)) = (x_bounds, y_bounds) else {
        let empty = Paragraph::new("Nothing checked")
            .block(Block::default().title(" Chart ").borders(Borders::ALL));
        f.render_widget(empty, cols[1]);
        return;
    };

    let datasets = app
        .visible()
        .map(|(i, series)| {
            Dataset::default()
                .name(app.names[i].clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(PALETTE[i % PALETTE.len()]))
                .data(series)
        })
        .collect();
    let chart = Chart::new(datasets)
        .block(Block::default().title(" Chart ").borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title(Span::styled("Time", Style::default().fg(Color::Red)))
                .style(Style::default().fg(Color::White))
                .bounds(x_bounds)
                .labels(labels(x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("Value", Style::default().fg(Color::Red)))
                .style(Style::default().fg(Color::White))
                .bounds(y_bounds)
                .labels(labels(y_bounds)),
        );
    f.render_widget(chart, cols[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::Sample;
    use ratatui::backend::TestBackend;

    fn table() -> LogTable {
        LogTable {
            attributes: vec!["thrust".to_owned(), "yaw".to_owned()],
            rows: (0..10)
                .map(|i| Sample {
                    timestamp: i as f64,
                    values: vec![i as f64 * 2.0, 5.0],
                })
                .collect(),
        }
    }

    #[test]
    fn selection_defaults_to_everything() {
        let app = App::new(&table(), &[]).unwrap();
        assert_eq!(app.checked, vec![true, true]);

        let app = App::new(&table(), &["yaw".to_owned()]).unwrap();
        assert_eq!(app.checked, vec![false, true]);

        assert!(matches!(
            App::new(&table(), &["pitch".to_owned()]),
            Err(GuiError::UnknownAttribute(name)) if name == "pitch"
        ));
    }

    #[test]
    fn checkboxes_toggle_under_the_cursor() {
        let mut app = App::new(&table(), &[]).unwrap();
        app.move_cursor(true);
        app.toggle();
        assert_eq!(app.checked, vec![true, false]);
        app.move_cursor(true);
        app.toggle();
        assert_eq!(app.checked, vec![false, false]);
        assert_eq!(app.visible().count(), 0);
        app.set_all(true);
        assert_eq!(app.visible().count(), 2);
    }

    #[test]
    fn time_axis_spans_the_whole_log() {
        let mut table = table();
        for row in table.rows.iter_mut() {
            row.timestamp *= 2.5;
        }
        let mut app = App::new(&table, &["yaw".to_owned()]).unwrap();
        // 0 to 22.5, padded by 5% each side.
        let [lo, hi] = app.x_bounds().unwrap();
        assert!((lo + 1.125).abs() < 1e-12);
        assert!((hi - 23.625).abs() < 1e-12);

        app.set_all(false);
        assert_eq!(app.x_bounds(), Some([lo, hi]));
        assert_eq!(App::new(&LogTable::default(), &[]).unwrap().x_bounds(), None);
    }

    #[test]
    fn bounds_follow_the_data() {
        assert_eq!(bounds([0.0, 10.0].into_iter()), Some([-0.5, 10.5]));
        assert_eq!(bounds([5.0, 5.0].into_iter()), Some([4.0, 6.0]));
        assert_eq!(bounds(std::iter::empty()), None);
    }

    #[test]
    fn renders_checked_series() {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        let mut app = App::new(&table(), &[]).unwrap();
        terminal.draw(|f| ui(f, &mut app)).unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("[x] thrust"));
        assert!(text.contains("Chart"));

        app.set_all(false);
        terminal.draw(|f| ui(f, &mut app)).unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("Nothing checked"));
    }
}
