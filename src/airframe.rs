//! Where the rotors are and how they look this tick. Nothing here feeds back
//! into the flight model; the renderer uses it to draw arms, hubs and
//! spinning blades that lean with the pitch/roll knob and spin faster or
//! slower per pair as the yaw axis is deflected.

use crate::sim::{ControlInputs, FlightState};
use crate::Point3;

use std::f64::consts::FRAC_1_SQRT_2;

/// Center-to-hub arm length.
pub const ARM_LENGTH: f64 = 2.0;
/// Blade radius as drawn.
pub const ROTOR_RADIUS: f64 = 1.2;
/// How far the nose marker sits ahead of the body center.
pub const NOSE_OFFSET: f64 = 0.5;

const YAW_SPIN_FACTOR: f64 = 0.2;
const PITCH_TILT: f64 = 0.3;
const ROLL_TILT: f64 = 0.3;
const PITCH_DROP: f64 = 0.5;
const ROLL_DROP: f64 = 0.5;

/// Diagonal rotors form a pair and spin the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotorPair {
    A,
    B,
}

/// One rotor as the renderer should draw it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotorPose {
    pub pair: RotorPair,
    pub hub: Point3,
    /// Angle of the blade line in the world xy-plane.
    pub blade_angle: f64,
}

impl RotorPose {
    /// The two ends of the blade line.
    pub fn blade_tips(&self) -> (Point3, Point3) {
        let (sin, cos) = self.blade_angle.sin_cos();
        let h = self.hub;
        (
            Point3::new(h.x - ROTOR_RADIUS * cos, h.y - ROTOR_RADIUS * sin, h.z),
            Point3::new(h.x + ROTOR_RADIUS * cos, h.y + ROTOR_RADIUS * sin, h.z),
        )
    }
}

// Body-frame hub offsets, pair, and spin direction.
const ROTORS: [((f64, f64), RotorPair, f64); 4] = [
    ((FRAC_1_SQRT_2, FRAC_1_SQRT_2), RotorPair::A, 1.0),
    ((FRAC_1_SQRT_2, -FRAC_1_SQRT_2), RotorPair::B, -1.0),
    ((-FRAC_1_SQRT_2, -FRAC_1_SQRT_2), RotorPair::A, 1.0),
    ((-FRAC_1_SQRT_2, FRAC_1_SQRT_2), RotorPair::B, -1.0),
];

/// Poses of all four rotors.
pub fn rotor_poses(state: &FlightState, controls: &ControlInputs) -> [RotorPose; 4] {
    let v = &state.vehicle;
    let (sin, cos) = v.yaw.sin_cos();
    let yaw_axis = controls.thrust_yaw.x;
    let pr = controls.pitch_roll;

    ROTORS.map(|((lx, ly), pair, spin)| {
        let (lx, ly) = (lx * ARM_LENGTH, ly * ARM_LENGTH);
        let rel_x = cos * lx - sin * ly;
        let rel_y = sin * lx + cos * ly;

        // Arm projected onto the nose and right-hand directions, in arm
        // lengths.
        let fwd = (-sin * rel_x + cos * rel_y) / ARM_LENGTH;
        let right = (cos * rel_x + sin * rel_y) / ARM_LENGTH;

        let spin_factor = match pair {
            RotorPair::A => 1.0 - 2.0 * yaw_axis * YAW_SPIN_FACTOR,
            RotorPair::B => 1.0 + 2.0 * yaw_axis * YAW_SPIN_FACTOR,
        };
        let tilt = 1.0 - 2.0 * PITCH_TILT * pr.y * fwd - 2.0 * ROLL_TILT * pr.x * right;
        let hub_z = v.z - PITCH_DROP * pr.y * fwd - ROLL_DROP * pr.x * right;

        RotorPose {
            pair,
            hub: Point3::new(v.x + rel_x, v.y + rel_y, hub_z),
            blade_angle: -spin * state.rotor_phase * spin_factor * tilt,
        }
    })
}

/// The marker showing which way the vehicle faces.
pub fn nose(state: &FlightState) -> Point3 {
    let v = &state.vehicle;
    Point3::new(
        v.x - NOSE_OFFSET * v.yaw.sin(),
        v.y + NOSE_OFFSET * v.yaw.cos(),
        v.z,
    )
}
