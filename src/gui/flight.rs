//! The game screen: a top-down view of the arena on the left, and on the
//! right the clock, the connection panel and the two knobs.
//!
//! Knobs can be dragged with the mouse. Keyboards have no key-up events in
//! most terminals, so keys nudge a knob and leave it there until it is
//! dragged, nudged back, or recentered with the space bar.

use crate::arbiter::{KnobId, Mode};
use crate::config::SimConfig;
use crate::context::{SimulationContext, Snapshot, UiCommand};
use crate::gui::{enter_terminal, error::GuiError, leave_terminal};
use crate::knob::KnobValue;
use crate::remote_feed::ConnectionStatus;
use crate::session::SessionEvent;
use crate::signals;
use crate::sim::ControlInputs;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use log::info;
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Circle, Line as CanvasLine, Points, Rectangle},
        *,
    },
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// How far one key press moves a knob, as a fraction of its radius.
const NUDGE: f64 = 0.1;

/// What a key press asks for.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Command(UiCommand),
    Nudge { knob: KnobId, dx: f64, dy: f64 },
    ToggleDifficult,
    NextDevice,
    Quit,
}

struct App {
    difficult: bool,
    selected_device: usize,
    notice: String,
    knob_radius: f64,
    /// Where each knob was last drawn, for mouse hit testing.
    knob_areas: Vec<(KnobId, Rect)>,
    dragging: Option<KnobId>,
}

impl App {
    fn new(difficult: bool, knob_radius: f64) -> Self {
        Self {
            difficult,
            selected_device: 0,
            notice: "Press g to start a game".to_owned(),
            knob_radius,
            knob_areas: Vec::new(),
            dragging: None,
        }
    }

    fn absorb(&mut self, events: &[SessionEvent]) {
        for event in events {
            let text = describe(event);
            info!("{}", text);
            self.notice = text;
        }
    }

    /// Turns a mouse event into a knob command, if it concerns a knob. A
    /// drag stays with the knob it started on.
    fn mouse(&mut self, mouse: MouseEvent) -> Option<UiCommand> {
        let (column, row) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let &(knob, area) = self
                    .knob_areas
                    .iter()
                    .find(|(_, area)| hit(*area, column, row))?;
                self.dragging = Some(knob);
                let (x, y) = knob_coords(area, column, row, self.knob_radius);
                Some(UiCommand::Pointer { knob, x, y })
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let knob = self.dragging?;
                let &(_, area) = self.knob_areas.iter().find(|(id, _)| *id == knob)?;
                let (x, y) = knob_coords(area, column, row, self.knob_radius);
                Some(UiCommand::Pointer { knob, x, y })
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.dragging.take()?;
                Some(UiCommand::ReleasePointer)
            }
            _ => None,
        }
    }
}

/// Runs the game until the user quits or a signal arrives, then shuts the
/// peripheral link down.
pub fn fly(
    mut ctx: SimulationContext,
    config: &SimConfig,
    difficult: bool,
    device: Option<String>,
) -> Result<(), GuiError> {
    let now = Instant::now();
    ctx.handle(UiCommand::Scan, now);
    if let Some(address) = device {
        ctx.handle(UiCommand::Connect(address), now);
    }

    let mut terminal = enter_terminal()?;
    let app = App::new(difficult, config.knob_radius);
    let res = run_app(&mut terminal, &mut ctx, app, config);
    leave_terminal(&mut terminal)?;

    ctx.shutdown();
    res
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    ctx: &mut SimulationContext,
    mut app: App,
    config: &SimConfig,
) -> Result<(), GuiError> {
    let tick_rate = config.tick_interval();
    let mut last_tick = Instant::now();
    let mut snapshot = ctx.tick(0.0, last_tick);

    // Knob moves between ticks redraw right away so the indicator follows
    // the pointer; otherwise the screen only changes on a tick.
    let knobs_moved = Arc::new(AtomicBool::new(false));
    for knob in [KnobId::ThrustYaw, KnobId::PitchRoll] {
        let flag = Arc::clone(&knobs_moved);
        ctx.set_redraw_hook(knob, Box::new(move |_| flag.store(true, Ordering::Relaxed)));
    }
    let mut dirty = true;

    loop {
        if knobs_moved.swap(false, Ordering::Relaxed) {
            snapshot.controls = ctx.controls();
            dirty = true;
        }
        if dirty {
            terminal.draw(|f| ui(f, &mut app, &snapshot))?;
            dirty = false;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            let action = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    key_action(key, &app, &snapshot)
                }
                Event::Mouse(mouse) => app.mouse(mouse).map(Action::Command),
                _ => None,
            };
            if action.is_some() {
                dirty = true;
            }
            match action {
                Some(Action::Quit) => return Ok(()),
                Some(Action::Command(cmd)) => ctx.handle(cmd, Instant::now()),
                Some(Action::Nudge { knob, dx, dy }) => {
                    let r = app.knob_radius;
                    ctx.handle(nudge(ctx.controls(), knob, dx * r, dy * r), Instant::now());
                }
                Some(Action::ToggleDifficult) => app.difficult = !app.difficult,
                Some(Action::NextDevice) => {
                    if !snapshot.devices.is_empty() {
                        app.selected_device = (app.selected_device + 1) % snapshot.devices.len();
                    }
                }
                None => {}
            }
        }

        if signals::shutdown_requested() {
            info!("Signal received, leaving");
            return Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            let now = Instant::now();
            let dt = config.step_dt(now - last_tick);
            last_tick = now;
            snapshot = ctx.tick(dt, now);
            app.absorb(&snapshot.events);
            dirty = true;
        }
    }
}

fn key_action(key: KeyEvent, app: &App, snapshot: &Snapshot) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }
    let push = |knob, dx, dy| Some(Action::Nudge { knob, dx, dy });
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('w') => push(KnobId::ThrustYaw, 0.0, NUDGE),
        KeyCode::Char('s') => push(KnobId::ThrustYaw, 0.0, -NUDGE),
        KeyCode::Char('a') => push(KnobId::ThrustYaw, -NUDGE, 0.0),
        KeyCode::Char('d') => push(KnobId::ThrustYaw, NUDGE, 0.0),
        KeyCode::Char('i') | KeyCode::Up => push(KnobId::PitchRoll, 0.0, NUDGE),
        KeyCode::Char('k') | KeyCode::Down => push(KnobId::PitchRoll, 0.0, -NUDGE),
        KeyCode::Char('j') | KeyCode::Left => push(KnobId::PitchRoll, -NUDGE, 0.0),
        KeyCode::Char('l') | KeyCode::Right => push(KnobId::PitchRoll, NUDGE, 0.0),
        KeyCode::Char(' ') => Some(Action::Command(UiCommand::ReleasePointer)),
        KeyCode::Char('g') => Some(Action::Command(UiCommand::StartSession {
            difficult: app.difficult,
        })),
        KeyCode::Char('h') => Some(Action::ToggleDifficult),
        KeyCode::Char('m') => Some(Action::Command(UiCommand::ToggleMode)),
        KeyCode::Char('r') => Some(Action::Command(UiCommand::Scan)),
        KeyCode::Tab => Some(Action::NextDevice),
        KeyCode::Char('c') => snapshot
            .devices
            .get(app.selected_device)
            .map(|d| Action::Command(UiCommand::Connect(d.address.clone()))),
        KeyCode::Char('x') => Some(Action::Command(UiCommand::Disconnect)),
        _ => None,
    }
}

/// A pointer command that moves `knob` by `(dx, dy)` from where it is now.
fn nudge(current: ControlInputs, knob: KnobId, dx: f64, dy: f64) -> UiCommand {
    let KnobValue { x, y } = match knob {
        KnobId::ThrustYaw => current.thrust_yaw,
        KnobId::PitchRoll => current.pitch_roll,
    };
    UiCommand::Pointer {
        knob,
        x: Some(x + dx),
        y: Some(y + dy),
    }
}

/// Maps a terminal cell inside a knob widget to knob coordinates. The
/// widget's border is outside the knob; cells on it map to `None`.
fn knob_coords(area: Rect, column: u16, row: u16, radius: f64) -> (Option<f64>, Option<f64>) {
    let inner = area.inner(&Margin::new(1, 1));
    if !hit(inner, column, row) {
        return (None, None);
    }
    let fx = (f64::from(column - inner.x) + 0.5) / f64::from(inner.width);
    let fy = (f64::from(row - inner.y) + 0.5) / f64::from(inner.height);
    (
        Some((2.0 * fx - 1.0) * radius),
        Some((1.0 - 2.0 * fy) * radius),
    )
}

fn hit(area: Rect, column: u16, row: u16) -> bool {
    column >= area.left() && column < area.right() && row >= area.top() && row < area.bottom()
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Started { difficult, targets } => format!(
            "Go! {} targets{}",
            targets,
            if *difficult { ", difficult start" } else { "" }
        ),
        SessionEvent::Abandoned { remaining } => {
            format!("Previous game abandoned with {} left", remaining)
        }
        SessionEvent::Captured(target) => format!("Captured {}", target.label),
        SessionEvent::Finished { elapsed, new_best } => format!(
            "Finished in {:.2}s{}",
            elapsed.as_secs_f64(),
            if *new_best { ", new best!" } else { "" }
        ),
    }
}

fn seconds(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:.2}s", d.as_secs_f64()),
        None => "-".to_owned(),
    }
}

fn ui(f: &mut Frame, app: &mut App, snap: &Snapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(1)])
        .split(f.size());
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(44)])
        .split(rows[0]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(12),
            Constraint::Length(3),
            Constraint::Length(11),
        ])
        .split(cols[1]);
    let knobs = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(side[2]);

    f.render_widget(arena(snap), cols[0]);
    f.render_widget(info_panel(app, snap), side[0]);
    f.render_widget(altitude(snap), side[1]);

    app.knob_areas = vec![(KnobId::ThrustYaw, knobs[0]), (KnobId::PitchRoll, knobs[1])];
    f.render_widget(
        knob_widget(" Thrust / Yaw ", snap.controls.thrust_yaw, app.knob_radius),
        knobs[0],
    );
    f.render_widget(
        knob_widget(" Pitch / Roll ", snap.controls.pitch_roll, app.knob_radius),
        knobs[1],
    );

    let help = Line::from(vec![
        " w/s a/d ".magenta().bold(),
        "thrust/yaw ".into(),
        "i/k j/l ".magenta().bold(),
        "pitch/roll ".into(),
        "g ".magenta().bold(),
        "new game ".into(),
        "h ".magenta().bold(),
        "difficult ".into(),
        "m ".magenta().bold(),
        "mode ".into(),
        "r/Tab/c/x ".magenta().bold(),
        "scan/pick/connect/disconnect ".into(),
        "q ".magenta().bold(),
        "quit".into(),
    ]);
    f.render_widget(Paragraph::new(help), rows[1]);
}

fn arena(snap: &Snapshot) -> impl Widget + '_ {
    let s = &snap.arena;
    Canvas::default()
        .block(
            Block::default()
                .title(" Arena (top view) ".magenta().bold())
                .borders(Borders::ALL),
        )
        .marker(Marker::Braille)
        .x_bounds([s.arena_x.0, s.arena_x.1])
        .y_bounds([s.arena_y.0, s.arena_y.1])
        .paint(move |ctx| {
            ctx.draw(&Rectangle {
                x: s.arena_x.0 + s.target_margin,
                y: s.arena_y.0 + s.target_margin,
                width: s.arena_x.1 - s.arena_x.0 - 2.0 * s.target_margin,
                height: s.arena_y.1 - s.arena_y.0 - 2.0 * s.target_margin,
                color: Color::DarkGray,
            });
            for target in &snap.targets {
                let p = target.position;
                ctx.draw(&Circle {
                    x: p.x,
                    y: p.y,
                    radius: s.body_radius,
                    color: Color::Yellow,
                });
                ctx.print(p.x, p.y, target.label.clone().yellow());
            }
            ctx.layer();

            let v = &snap.vehicle;
            for rotor in &snap.rotors {
                ctx.draw(&CanvasLine {
                    x1: v.x,
                    y1: v.y,
                    x2: rotor.hub.x,
                    y2: rotor.hub.y,
                    color: Color::Gray,
                });
                let (a, b) = rotor.blade_tips();
                ctx.draw(&CanvasLine {
                    x1: a.x,
                    y1: a.y,
                    x2: b.x,
                    y2: b.y,
                    color: Color::Cyan,
                });
            }
            ctx.draw(&Points {
                coords: &[(snap.nose.x, snap.nose.y)],
                color: Color::Red,
            });
        })
}

fn info_panel<'a>(app: &App, snap: &'a Snapshot) -> Paragraph<'a> {
    let v = &snap.vehicle;
    let status_style = match snap.status {
        ConnectionStatus::Connected => Style::default().fg(Color::Green),
        ConnectionStatus::Connecting => Style::default().fg(Color::Yellow),
        ConnectionStatus::Error => Style::default().fg(Color::Red),
        ConnectionStatus::Disconnected => Style::default().fg(Color::Gray),
    };
    let mode = match snap.mode {
        Mode::Manual => "Manual".green().bold(),
        Mode::Remote => "Remote".cyan().bold(),
    };

    let mut lines = vec![
        Line::from(vec![
            "Time ".into(),
            seconds(snap.elapsed).bold(),
            "  Best ".into(),
            seconds(snap.best_time).bold(),
        ]),
        Line::from(format!(
            "Drone ({:.1}, {:.1}, {:.1}) yaw {:.0}°",
            v.x,
            v.y,
            v.z,
            v.yaw.to_degrees()
        )),
        Line::from(vec![
            "[".into(),
            if app.difficult { "x".bold() } else { " ".into() },
            "] Difficult".into(),
        ]),
        Line::from(vec!["Mode ".into(), mode]),
        Line::from(Span::styled(snap.status_line.clone(), status_style)),
        Line::from(app.notice.clone().magenta()),
        Line::from("Targets".bold()),
    ];
    if snap.targets.is_empty() {
        lines.push(Line::from("  none"));
    }
    for target in &snap.targets {
        lines.push(Line::from(format!("  {} {}", target.label, target.position)));
    }
    lines.push(Line::from("Devices".bold()));
    if snap.devices.is_empty() {
        lines.push(Line::from("  none, press r to scan"));
    }
    for (i, device) in snap.devices.iter().enumerate() {
        let marker = if i == app.selected_device { ">>" } else { "  " };
        lines.push(Line::from(format!("{}{}", marker, device)));
    }

    Paragraph::new(lines)
        .block(
            Block::default()
                .title(" droneknob ".magenta().bold())
                .borders(Borders::ALL),
        )
        .wrap(Wrap { trim: true })
}

fn altitude(snap: &Snapshot) -> Gauge<'static> {
    let (lo, hi) = snap.arena.arena_z;
    let ratio = if hi > lo {
        ((snap.vehicle.z - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Gauge::default()
        .block(Block::default().title(" Altitude ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("{:.1}", snap.vehicle.z))
}

fn knob_widget(title: &'static str, value: KnobValue, radius: f64) -> impl Widget {
    Canvas::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .marker(Marker::Braille)
        .x_bounds([-radius, radius])
        .y_bounds([-radius, radius])
        .paint(move |ctx| {
            ctx.draw(&Circle {
                x: 0.0,
                y: 0.0,
                radius,
                color: Color::DarkGray,
            });
            ctx.draw(&CanvasLine {
                x1: -radius,
                y1: 0.0,
                x2: radius,
                y2: 0.0,
                color: Color::DarkGray,
            });
            ctx.draw(&CanvasLine {
                x1: 0.0,
                y1: -radius,
                x2: 0.0,
                y2: radius,
                color: Color::DarkGray,
            });
            ctx.layer();
            ctx.draw(&Circle {
                x: value.x,
                y: value.y,
                radius: 0.1 * radius,
                color: Color::Magenta,
            });
        })
}
