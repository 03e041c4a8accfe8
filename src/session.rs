//! The timed game: fly through every target as fast as possible.

use crate::sim::VehicleState;
use crate::Point3;

use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::time::{Duration, Instant};

/// Where targets may appear and how close counts as a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Visible x range of the arena.
    pub arena_x: (f64, f64),
    /// Visible y range of the arena.
    pub arena_y: (f64, f64),
    /// Visible z range of the arena. Only the renderer uses this.
    pub arena_z: (f64, f64),
    /// Targets keep at least this far inside the x and y ranges.
    pub target_margin: f64,
    /// Altitude band targets are placed in.
    pub target_altitude: (f64, f64),
    pub target_count: usize,
    /// A target is captured when the vehicle center is strictly closer than
    /// this, and is never placed this close to the start pose.
    pub body_radius: f64,
    /// Draws per target before giving up on random placement.
    pub max_placement_attempts: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            arena_x: (-10.0, 10.0),
            arena_y: (-10.0, 10.0),
            arena_z: (-1.0, 10.0),
            target_margin: 1.0,
            target_altitude: (1.0, 5.0),
            target_count: 3,
            body_radius: 1.5,
            max_placement_attempts: 1000,
        }
    }
}

/// A point to fly through.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub position: Point3,
    pub label: String,
}

/// Things worth telling the player about.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started { difficult: bool, targets: usize },
    /// A new game replaced one that still had targets left.
    Abandoned { remaining: usize },
    Captured(Target),
    Finished { elapsed: Duration, new_best: bool },
}

#[derive(Debug)]
struct Session {
    started_at: Instant,
    targets: Vec<Target>,
}

/// Runs at most one game at a time and remembers the best finishing time for
/// as long as the process lives.
#[derive(Debug)]
pub struct GoalTracker {
    settings: SessionSettings,
    rng: StdRng,
    session: Option<Session>,
    best_time: Option<Duration>,
}

impl GoalTracker {
    pub fn new(settings: SessionSettings, rng: StdRng) -> Self {
        Self {
            settings,
            rng,
            session: None,
            best_time: None,
        }
    }

    /// A tracker with a fixed seed is fully reproducible; without one it is
    /// seeded from the OS.
    pub fn with_seed(settings: SessionSettings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(settings, rng)
    }

    /// Starts a new game, throwing away whatever is left of the current one.
    ///
    /// The vehicle goes back to the start pose. In difficult mode it starts
    /// facing somewhere into the half-plane behind it.
    pub fn start_session(
        &mut self,
        vehicle: &mut VehicleState,
        difficult: bool,
        now: Instant,
    ) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if let Some(old) = self.session.take() {
            if !old.targets.is_empty() {
                events.push(SessionEvent::Abandoned {
                    remaining: old.targets.len(),
                });
            }
        }

        *vehicle = VehicleState::START;
        if difficult {
            vehicle.yaw = self.rng.gen_range(FRAC_PI_2..3.0 * FRAC_PI_2);
        }

        // A game with nothing to capture would finish on its first check.
        let count = self.settings.target_count.max(1);
        let origin = vehicle.position();
        let targets: Vec<Target> = (0..count)
            .map(|i| Target {
                position: self.place_target(origin),
                label: format!("T{}", i + 1),
            })
            .collect();

        info!(
            "New {} game with {} targets",
            if difficult { "difficult" } else { "normal" },
            targets.len()
        );
        events.push(SessionEvent::Started {
            difficult,
            targets: targets.len(),
        });
        self.session = Some(Session {
            started_at: now,
            targets,
        });
        events
    }

    /// Removes every target the vehicle is touching. Finishes the game when
    /// none are left.
    pub fn check_captures(&mut self, vehicle: &VehicleState, now: Instant) -> Vec<SessionEvent> {
        let Some(session) = self.session.as_mut() else {
            return vec![];
        };

        let position = vehicle.position();
        let radius = self.settings.body_radius;
        let (captured, remaining): (Vec<Target>, Vec<Target>) = session
            .targets
            .drain(..)
            .partition(|t| t.position.distance(&position) < radius);
        session.targets = remaining;

        let mut events: Vec<SessionEvent> =
            captured.into_iter().map(SessionEvent::Captured).collect();

        if session.targets.is_empty() {
            let elapsed = now.saturating_duration_since(session.started_at);
            let new_best = self.best_time.map_or(true, |best| elapsed < best);
            if new_best {
                self.best_time = Some(elapsed);
            }
            info!(
                "Game finished in {:.2}s{}",
                elapsed.as_secs_f64(),
                if new_best { ", a new best" } else { "" }
            );
            events.push(SessionEvent::Finished { elapsed, new_best });
            self.session = None;
        }
        events
    }

    /// Outstanding targets, empty when no game is running.
    pub fn targets(&self) -> &[Target] {
        self.session
            .as_ref()
            .map(|s| s.targets.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Time since the running game started.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.session
            .as_ref()
            .map(|s| now.saturating_duration_since(s.started_at))
    }

    pub fn best_time(&self) -> Option<Duration> {
        self.best_time
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Rejection-samples a target that is not already touching `origin`.
    fn place_target(&mut self, origin: Point3) -> Point3 {
        let s = &self.settings;
        let x_range = inset(s.arena_x, s.target_margin);
        let y_range = inset(s.arena_y, s.target_margin);
        let z_range = s.target_altitude;
        let radius = s.body_radius;

        for _ in 0..s.max_placement_attempts {
            let candidate = Point3::new(
                sample_span(&mut self.rng, x_range),
                sample_span(&mut self.rng, y_range),
                sample_span(&mut self.rng, z_range),
            );
            if candidate.distance(&origin) > radius {
                return candidate;
            }
        }

        // Farthest inset corner from the vehicle, at the top of the band.
        let fallback = Point3::new(
            far_end(x_range, origin.x),
            far_end(y_range, origin.y),
            if z_range.1 >= z_range.0 {
                z_range.1
            } else {
                midpoint(z_range)
            },
        );
        warn!(
            "No free spot for a target after {} tries, using {}",
            s.max_placement_attempts, fallback
        );
        fallback
    }
}

fn inset(range: (f64, f64), margin: f64) -> (f64, f64) {
    (range.0 + margin, range.1 - margin)
}

fn midpoint(range: (f64, f64)) -> f64 {
    range.0 / 2.0 + range.1 / 2.0
}

/// Uniform over `[lo, hi)`, or the midpoint when the range is empty,
/// inverted, or too wide to measure.
fn sample_span(rng: &mut StdRng, range: (f64, f64)) -> f64 {
    if range.1 > range.0 && (range.1 - range.0).is_finite() {
        rng.gen_range(range.0..range.1)
    } else {
        midpoint(range)
    }
}

fn far_end(range: (f64, f64), from: f64) -> f64 {
    if range.1 < range.0 {
        midpoint(range)
    } else if from <= midpoint(range) {
        range.1
    } else {
        range.0
    }
}
