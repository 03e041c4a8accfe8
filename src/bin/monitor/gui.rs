use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::{
    collections::VecDeque,
    error::Error,
    io,
    sync::mpsc,
    time::{Duration, Instant},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame, Terminal,
};

use droneknob::peripheral::DeviceInfo;
use droneknob::remote_feed::{FeedEvent, RemoteFeedHandle};
use droneknob::signals;
use log::info;

/// Seconds of history on screen.
const WINDOW: f64 = 10.0;

const AXES: [(&str, Color); 4] = [
    ("pitch/roll x", Color::Cyan),
    ("pitch/roll y", Color::Red),
    ("thrust/yaw x", Color::Green),
    ("thrust/yaw y", Color::Yellow),
];

struct App {
    feed: RemoteFeedHandle,
    events: mpsc::Receiver<FeedEvent>,
    title: String,
    start: Instant,
    history: VecDeque<(f64, [f64; 4])>,
    series: [Vec<(f64, f64)>; 4],
    now: f64,
}

impl App {
    fn new(device: &DeviceInfo, feed: RemoteFeedHandle, events: mpsc::Receiver<FeedEvent>) -> App {
        App {
            feed,
            events,
            title: device.to_string(),
            start: Instant::now(),
            history: VecDeque::new(),
            series: Default::default(),
            now: 0.0,
        }
    }

    fn on_tick(&mut self) {
        // The title reads the status straight from the feed; the events are
        // only logged.
        while let Ok(event) = self.events.try_recv() {
            if let FeedEvent::ConnectionStatusChanged { status, message } = event {
                info!("{}: {}", status, message);
            }
        }

        self.now = self.start.elapsed().as_secs_f64();
        let axes = self.feed.snapshot().axes.to_array();
        self.history.push_back((self.now, axes));
        while let Some(&(t, _)) = self.history.front() {
            if t >= self.now - WINDOW {
                break;
            }
            self.history.pop_front();
        }

        for (i, series) in self.series.iter_mut().enumerate() {
            *series = self.history.iter().map(|&(t, a)| (t, a[i])).collect();
        }
    }
}

pub fn engage_gui(
    device: &DeviceInfo,
    feed: RemoteFeedHandle,
    events: mpsc::Receiver<FeedEvent>,
) -> Result<(), Box<dyn Error>> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // create app and run it
    let tick_rate = Duration::from_millis(50);
    let app = App::new(device, feed, events);
    let res = run_app(&mut terminal, app, tick_rate);

    // restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{:?}", err)
    }

    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| ui(f, &app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if let KeyCode::Char('q') | KeyCode::Esc = key.code {
                    return Ok(());
                }
            }
        }
        if signals::shutdown_requested() {
            return Ok(());
        }
        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let state = app.feed.snapshot();
    let peak = app
        .series
        .iter()
        .flatten()
        .fold(1.0_f64, |m, &(_, v)| m.max(v.abs()));

    let datasets = AXES
        .iter()
        .zip(&app.series)
        .map(|(&(name, color), data)| {
            Dataset::default()
                .name(name)
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(color))
                .data(data)
        })
        .collect();

    let t0 = (app.now - WINDOW).max(0.0);
    let t1 = t0 + WINDOW;
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " {} | {} | {} payloads ",
            app.title, state.status_text, state.accepted
        )))
        .x_axis(
            Axis::default()
                .title(Span::styled("Seconds", Style::default().fg(Color::Red)))
                .style(Style::default().fg(Color::White))
                .bounds([t0, t1])
                .labels(
                    [t0, t1]
                        .iter()
                        .map(|t| Span::from(format!("{:.0}", t)))
                        .collect(),
                ),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("Axis", Style::default().fg(Color::Red)))
                .style(Style::default().fg(Color::White))
                .bounds([-peak, peak])
                .labels(
                    [-peak, 0.0, peak]
                        .iter()
                        .map(|v| Span::from(format!("{:.1}", v)))
                        .collect(),
                ),
        );

    f.render_widget(chart, f.size());
}

#[cfg(test)]
mod tests {
    use super::*;
    use droneknob::remote_feed::ConnectionStatus;

    #[test]
    fn ticks_drain_status_events() {
        let (feed, events) = RemoteFeedHandle::new();
        let device = DeviceInfo {
            name: "pad".to_owned(),
            address: "/dev/ttyUSB0".to_owned(),
        };
        let mut app = App::new(&device, feed.clone(), events);

        feed.set_status(ConnectionStatus::Connecting, "Connecting");
        feed.set_status(ConnectionStatus::Connected, "Connected");
        feed.apply_payload(b"[10, 20, 30, 40]");
        app.on_tick();

        assert!(app.events.try_recv().is_err());
        assert_eq!(app.history.len(), 1);
        assert!((app.series[3][0].1 - 0.4).abs() < 1e-12);
    }
}
