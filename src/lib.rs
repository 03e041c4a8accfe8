//! droneknob is a small quadcopter toy that you fly from the terminal. Two
//! on-screen knobs (thrust & yaw, pitch & roll) drive a tiny kinematic model
//! at a fixed tick, and a timed game asks you to fly through three targets as
//! fast as you can.
//!
//! The knobs can also be driven by a remote peripheral. A background worker
//! owns the peripheral connection, decodes its notifications into four
//! normalized axis values, and leaves them in a guarded slot that the main
//! loop samples once per tick. Which side is in charge is decided by the
//! [mode arbiter](arbiter).
//!
//! Two companion tools ship alongside the game: an environment smoke test and
//! a CSV log plotter with checkbox series selection, plus a `monitor` binary
//! that charts the raw remote feed while bringing up a new controller.
//!
//! The interesting part lives in [`context::SimulationContext`], which owns
//! every piece of state the main loop mutates.

#![warn(missing_docs)]
pub mod airframe;
pub mod arbiter;
pub mod args;
pub mod config;
pub mod context;
pub mod data_source;
pub mod dummy_peripheral;
pub mod envcheck;
pub mod gui;
pub mod knob;
pub mod notification_decoder;
pub mod peripheral;
pub mod peripheral_link;
pub mod remote_feed;
pub mod serial_peripheral;
pub mod session;
pub mod signals;
pub mod sim;

use std::fmt::Display;

/// A point in the simulated world. `z` points up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// Builds a point from its three coordinates.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance between two points.
    pub fn distance(&self, other: &Self) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

impl Display for Point3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(2.0, 3.0, 6.0);
        assert!((a.distance(&b) - 7.0).abs() < 1e-12);
    }
}
