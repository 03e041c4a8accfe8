//! Decides who is flying: the local pointer or the remote peripheral.
//!
//! Only one side owns the two knobs in any tick. Handing control back to the
//! local side always recenters both knobs so the vehicle does not lurch on
//! whatever the remote last sent.

use crate::knob::{Knob, KnobValue};
use crate::remote_feed::{ConnectionStatus, RemoteFeedHandle};
use crate::sim::ControlInputs;

use log::info;
use std::fmt;

/// Who owns the knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Manual,
    Remote,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Manual => write!(f, "Manual"),
            Mode::Remote => write!(f, "Remote"),
        }
    }
}

/// Names one of the two knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnobId {
    ThrustYaw,
    PitchRoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterError {
    /// Remote mode needs a live connection; holds the status at the time.
    NotConnected(ConnectionStatus),
}

impl fmt::Display for ArbiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArbiterError::NotConnected(status) => {
                write!(f, "cannot switch to remote control while {}", status)
            }
        }
    }
}

impl std::error::Error for ArbiterError {}

/// Owns the two knobs and the mode flag.
#[derive(Debug)]
pub struct ModeArbiter {
    mode: Mode,
    thrust_yaw: Knob,
    pitch_roll: Knob,
}

impl ModeArbiter {
    /// Starts in manual mode with both knobs centered.
    pub fn new(knob_radius: f64) -> Self {
        Self {
            mode: Mode::Manual,
            thrust_yaw: Knob::new(knob_radius),
            pitch_roll: Knob::new(knob_radius),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn knob(&self, id: KnobId) -> &Knob {
        match id {
            KnobId::ThrustYaw => &self.thrust_yaw,
            KnobId::PitchRoll => &self.pitch_roll,
        }
    }

    pub fn knob_mut(&mut self, id: KnobId) -> &mut Knob {
        match id {
            KnobId::ThrustYaw => &mut self.thrust_yaw,
            KnobId::PitchRoll => &mut self.pitch_roll,
        }
    }

    /// The current knob pair, without consulting the feed.
    pub fn controls(&self) -> ControlInputs {
        ControlInputs {
            thrust_yaw: self.thrust_yaw.value(),
            pitch_roll: self.pitch_roll.value(),
        }
    }

    /// Hands the knobs to the remote side. Only allowed while connected.
    pub fn engage_remote(&mut self, status: ConnectionStatus) -> Result<(), ArbiterError> {
        if status != ConnectionStatus::Connected {
            return Err(ArbiterError::NotConnected(status));
        }
        if self.mode != Mode::Remote {
            info!("Remote control engaged");
        }
        self.mode = Mode::Remote;
        Ok(())
    }

    /// Takes the knobs back and recenters them. Always allowed.
    pub fn release_to_manual(&mut self) {
        if self.mode != Mode::Manual {
            info!("Back to manual control");
        }
        self.mode = Mode::Manual;
        self.thrust_yaw.reset();
        self.pitch_roll.reset();
    }

    /// The mode button: manual goes remote if it can, anything else goes
    /// manual.
    pub fn toggle(&mut self, status: ConnectionStatus) -> Mode {
        match self.mode {
            Mode::Manual if status == ConnectionStatus::Connected => {
                // Checked just above, cannot fail.
                let _ = self.engage_remote(status);
            }
            _ => self.release_to_manual(),
        }
        self.mode
    }

    /// A pointer drag over one of the knobs. Ignored unless in manual mode.
    pub fn pointer(&mut self, id: KnobId, x: Option<f64>, y: Option<f64>) -> bool {
        if self.mode != Mode::Manual {
            return false;
        }
        self.knob_mut(id).set(x, y)
    }

    /// The pointer let go: the knobs spring back to center.
    pub fn release_pointer(&mut self) {
        if self.mode == Mode::Manual {
            self.thrust_yaw.reset();
            self.pitch_roll.reset();
        }
    }

    /// Produces this tick's authoritative inputs.
    ///
    /// In remote mode the whole feed is copied under one lock and pushed
    /// through the knobs, so remote values are clamped like local ones. If
    /// the link is no longer up, control falls back to manual instead.
    pub fn sample(&mut self, feed: &RemoteFeedHandle) -> ControlInputs {
        if self.mode == Mode::Remote {
            let state = feed.snapshot();
            if state.status == ConnectionStatus::Connected {
                set_knob(&mut self.thrust_yaw, state.axes.thrust_yaw);
                set_knob(&mut self.pitch_roll, state.axes.pitch_roll);
            } else {
                self.release_to_manual();
            }
        }
        self.controls()
    }
}

fn set_knob(knob: &mut Knob, value: KnobValue) {
    knob.set(Some(value.x), Some(value.y));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_feed(payload: &[u8]) -> RemoteFeedHandle {
        let (feed, _rx) = RemoteFeedHandle::new();
        feed.set_status(ConnectionStatus::Connected, "Connected");
        assert!(feed.apply_payload(payload));
        feed
    }

    #[test]
    fn remote_needs_a_connection() {
        let mut arbiter = ModeArbiter::new(1.0);
        for status in [
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Error,
        ] {
            assert_eq!(
                arbiter.engage_remote(status),
                Err(ArbiterError::NotConnected(status))
            );
            assert_eq!(arbiter.toggle(status), Mode::Manual);
        }
        assert_eq!(arbiter.toggle(ConnectionStatus::Connected), Mode::Remote);
        assert_eq!(arbiter.toggle(ConnectionStatus::Connected), Mode::Manual);
    }

    #[test]
    fn remote_mode_follows_the_feed() {
        let feed = connected_feed(b"[10, 20, 30, 40]");
        let mut arbiter = ModeArbiter::new(1.0);
        arbiter.engage_remote(feed.status()).unwrap();

        let controls = arbiter.sample(&feed);
        assert_eq!(controls.pitch_roll, KnobValue::new(0.1, 0.2));
        assert_eq!(controls.thrust_yaw, KnobValue::new(0.3, 0.4));
    }

    #[test]
    fn remote_values_are_clamped_too() {
        let feed = connected_feed(b"[300, 400, 0, -500]");
        let mut arbiter = ModeArbiter::new(1.0);
        arbiter.engage_remote(feed.status()).unwrap();

        let controls = arbiter.sample(&feed);
        assert!((controls.pitch_roll.x - 0.6).abs() < 1e-12);
        assert!((controls.pitch_roll.y - 0.8).abs() < 1e-12);
        assert_eq!(controls.thrust_yaw, KnobValue::new(0.0, -1.0));
    }

    #[test]
    fn manual_mode_ignores_the_feed() {
        let feed = connected_feed(b"[100, 100, 100, 100]");
        let mut arbiter = ModeArbiter::new(1.0);
        arbiter.pointer(KnobId::ThrustYaw, Some(0.0), Some(0.5));

        let controls = arbiter.sample(&feed);
        assert_eq!(controls.thrust_yaw, KnobValue::new(0.0, 0.5));
        assert_eq!(controls.pitch_roll, KnobValue::ORIGIN);
    }

    #[test]
    fn pointer_is_ignored_in_remote_mode() {
        let feed = connected_feed(b"[0, 0, 0, 0]");
        let mut arbiter = ModeArbiter::new(1.0);
        arbiter.engage_remote(feed.status()).unwrap();

        assert!(!arbiter.pointer(KnobId::PitchRoll, Some(0.5), Some(0.5)));
        arbiter.release_pointer();
        assert_eq!(arbiter.sample(&feed), ControlInputs::default());
    }

    #[test]
    fn going_manual_recenters_both_knobs() {
        let feed = connected_feed(b"[90, -90, 45, 80]");
        let mut arbiter = ModeArbiter::new(1.0);
        arbiter.engage_remote(feed.status()).unwrap();
        assert_ne!(arbiter.sample(&feed), ControlInputs::default());

        arbiter.release_to_manual();

        assert_eq!(arbiter.mode(), Mode::Manual);
        assert_eq!(arbiter.controls(), ControlInputs::default());
        // The feed still holds the old values; manual mode must not see them.
        assert_eq!(arbiter.sample(&feed), ControlInputs::default());
    }

    #[test]
    fn a_dropped_link_falls_back_to_manual() {
        let feed = connected_feed(b"[50, 50, 50, 50]");
        let mut arbiter = ModeArbiter::new(1.0);
        arbiter.engage_remote(feed.status()).unwrap();
        arbiter.sample(&feed);

        feed.set_status(ConnectionStatus::Error, "Link lost");
        let controls = arbiter.sample(&feed);

        assert_eq!(arbiter.mode(), Mode::Manual);
        assert_eq!(controls, ControlInputs::default());
    }

    #[test]
    fn letting_go_springs_back() {
        let mut arbiter = ModeArbiter::new(1.0);
        arbiter.pointer(KnobId::ThrustYaw, Some(0.3), Some(0.3));
        arbiter.pointer(KnobId::PitchRoll, Some(-2.0), Some(0.0));
        assert_eq!(arbiter.controls().pitch_roll, KnobValue::new(-1.0, 0.0));

        arbiter.release_pointer();
        assert_eq!(arbiter.controls(), ControlInputs::default());
    }
}
