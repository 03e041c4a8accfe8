//! [`SimulationContext`] owns every piece of state the main loop mutates.
//!
//! The presentation layer talks to it in two ways only: it hands in
//! [`UiCommand`]s as the user acts, and once per tick it calls
//! [`SimulationContext::tick`] and draws the [`Snapshot`] it gets back. The
//! peripheral side never sees the context at all, just the
//! [`RemoteFeedHandle`].

use crate::airframe::{self, RotorPose};
use crate::arbiter::{KnobId, Mode, ModeArbiter};
use crate::config::SimConfig;
use crate::knob::RedrawHook;
use crate::peripheral::DeviceInfo;
use crate::peripheral_link::PeripheralLink;
use crate::remote_feed::{ConnectionStatus, FeedEvent, RemoteFeedHandle};
use crate::session::{GoalTracker, SessionEvent, SessionSettings, Target};
use crate::sim::{ControlInputs, FlightModel, FlightState, VehicleState};
use crate::Point3;

use log::{debug, info};
use std::{
    sync::mpsc,
    time::{Duration, Instant},
};

/// Everything the user can ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    /// Pointer dragged over a knob, in knob coordinates. `None` means the
    /// pointer is outside the widget.
    Pointer {
        knob: KnobId,
        x: Option<f64>,
        y: Option<f64>,
    },
    ReleasePointer,
    ToggleMode,
    StartSession {
        difficult: bool,
    },
    Scan,
    Connect(String),
    Disconnect,
}

/// What the renderer needs for one frame. Taken after the tick's update, so
/// it is always consistent with itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub vehicle: VehicleState,
    pub rotor_phase: f64,
    pub rotors: [RotorPose; 4],
    pub nose: Point3,
    pub targets: Vec<Target>,
    pub controls: ControlInputs,
    pub mode: Mode,
    pub status: ConnectionStatus,
    pub status_line: String,
    pub devices: Vec<DeviceInfo>,
    pub elapsed: Option<Duration>,
    pub best_time: Option<Duration>,
    /// Session notifications raised since the previous snapshot.
    pub events: Vec<SessionEvent>,
    pub arena: SessionSettings,
}

pub struct SimulationContext {
    arbiter: ModeArbiter,
    flight: FlightState,
    model: FlightModel,
    tracker: GoalTracker,
    feed: RemoteFeedHandle,
    feed_events: mpsc::Receiver<FeedEvent>,
    link: Option<PeripheralLink>,
    status_line: String,
    devices: Vec<DeviceInfo>,
    pending: Vec<SessionEvent>,
}

impl SimulationContext {
    /// Builds a context in manual mode with no game running. `link` is
    /// `None` when flying without any peripheral.
    pub fn new(
        config: &SimConfig,
        feed: RemoteFeedHandle,
        feed_events: mpsc::Receiver<FeedEvent>,
        link: Option<PeripheralLink>,
    ) -> Self {
        let status_line = if link.is_some() {
            feed.snapshot().status_text
        } else {
            "No peripheral".to_owned()
        };
        Self {
            arbiter: ModeArbiter::new(config.knob_radius),
            flight: FlightState::default(),
            model: config.flight,
            tracker: GoalTracker::with_seed(config.session.clone(), config.seed),
            feed,
            feed_events,
            link,
            status_line,
            devices: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn feed(&self) -> &RemoteFeedHandle {
        &self.feed
    }

    pub fn mode(&self) -> Mode {
        self.arbiter.mode()
    }

    /// The knobs as they stand right now, including commands handled since
    /// the last tick.
    pub fn controls(&self) -> ControlInputs {
        self.arbiter.controls()
    }

    /// Forwards to [`Knob::set_redraw_hook`](crate::knob::Knob::set_redraw_hook)
    /// on one of the arbiter's knobs.
    pub fn set_redraw_hook(&mut self, knob: KnobId, hook: RedrawHook) {
        self.arbiter.knob_mut(knob).set_redraw_hook(hook);
    }

    pub fn handle(&mut self, cmd: UiCommand, now: Instant) {
        match cmd {
            UiCommand::Pointer { knob, x, y } => {
                self.arbiter.pointer(knob, x, y);
            }
            UiCommand::ReleasePointer => self.arbiter.release_pointer(),
            UiCommand::ToggleMode => {
                let status = self.feed.status();
                let before = self.arbiter.mode();
                let after = self.arbiter.toggle(status);
                if before == Mode::Manual && after == Mode::Manual {
                    self.status_line = "Connect a device before switching to remote".to_owned();
                }
            }
            UiCommand::StartSession { difficult } => {
                let events = self
                    .tracker
                    .start_session(&mut self.flight.vehicle, difficult, now);
                self.pending.extend(events);
            }
            UiCommand::Scan => match &self.link {
                Some(link) => {
                    self.status_line = "Scanning...".to_owned();
                    link.scan();
                }
                None => self.status_line = "No peripheral".to_owned(),
            },
            UiCommand::Connect(address) => match &self.link {
                Some(link) => link.connect(address),
                None => self.status_line = "No peripheral".to_owned(),
            },
            UiCommand::Disconnect => {
                // Control comes back here before the worker even hears
                // about it.
                self.arbiter.release_to_manual();
                self.feed.reset_axes();
                match &self.link {
                    Some(link) => {
                        // Mark the link down now so a toggle queued behind
                        // this command cannot re-engage remote.
                        if self.feed.status() != ConnectionStatus::Disconnected {
                            self.feed
                                .set_status(ConnectionStatus::Disconnected, "Disconnecting...");
                        }
                        link.disconnect();
                    }
                    None => self.status_line = "No device".to_owned(),
                }
            }
        }
    }

    /// One step of the main loop: pick up what the background side
    /// reported, decide this tick's inputs, move the vehicle, and check the
    /// targets.
    pub fn tick(&mut self, dt: f64, now: Instant) -> Snapshot {
        self.drain_feed_events();

        let controls = self.arbiter.sample(&self.feed);
        self.model.step(&mut self.flight, &controls, dt);

        let captured = self.tracker.check_captures(&self.flight.vehicle, now);
        self.pending.extend(captured);

        self.snapshot(controls, now)
    }

    fn drain_feed_events(&mut self) {
        loop {
            match self.feed_events.try_recv() {
                Ok(FeedEvent::ConnectionStatusChanged { status, message }) => {
                    debug!("Peripheral status {}: {}", status, message);
                    if status != ConnectionStatus::Connected && self.arbiter.mode() == Mode::Remote
                    {
                        self.arbiter.release_to_manual();
                    }
                    self.status_line = message;
                }
                Ok(FeedEvent::DevicesFound(devices)) => {
                    self.status_line = format!("Found {} device(s)", devices.len());
                    self.devices = devices;
                }
                Err(mpsc::TryRecvError::Empty) => break,
                // Every sender lives in `self.feed`, so this cannot happen
                // while we are alive.
                Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }
    }

    fn snapshot(&mut self, controls: ControlInputs, now: Instant) -> Snapshot {
        Snapshot {
            vehicle: self.flight.vehicle,
            rotor_phase: self.flight.rotor_phase,
            rotors: airframe::rotor_poses(&self.flight, &controls),
            nose: airframe::nose(&self.flight),
            targets: self.tracker.targets().to_vec(),
            controls,
            mode: self.arbiter.mode(),
            status: self.feed.status(),
            status_line: self.status_line.clone(),
            devices: self.devices.clone(),
            elapsed: self.tracker.elapsed(now),
            best_time: self.tracker.best_time(),
            events: std::mem::take(&mut self.pending),
            arena: self.tracker.settings().clone(),
        }
    }

    /// Closes the peripheral connection, if any, and waits for the worker.
    pub fn shutdown(&mut self) {
        self.arbiter.release_to_manual();
        if let Some(mut link) = self.link.take() {
            info!("Shutting down the peripheral link");
            link.shutdown();
        }
    }
}

impl Drop for SimulationContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
