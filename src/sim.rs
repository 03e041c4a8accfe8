//! The per-tick flight integrator.
//!
//! This is a toy, not a flight model: the thrust axis sets a rotor speed,
//! rotor speed above or below the neutral rate climbs or sinks, the yaw axis
//! turns, and the pitch/roll knob slides the vehicle in its own heading
//! frame.

use crate::knob::KnobValue;
use crate::Point3;

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// The authoritative knob pair for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlInputs {
    /// x turns (positive is clockwise seen from above), y is thrust.
    pub thrust_yaw: KnobValue,
    /// x slides right, y slides forward, both in the vehicle's frame.
    pub pitch_roll: KnobValue,
}

/// Where the vehicle is and which way it faces. Yaw is in radians,
/// counter-clockwise from the +y axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
}

impl VehicleState {
    /// The pose every game starts from: hovering above the origin, nose
    /// along +y.
    pub const START: VehicleState = VehicleState {
        x: 0.0,
        y: 0.0,
        z: 2.5,
        yaw: 0.0,
    };

    pub fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::START
    }
}

/// Vehicle pose plus the accumulated rotor angle used to animate the blades.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlightState {
    pub vehicle: VehicleState,
    pub rotor_phase: f64,
}

/// Gains of the toy flight model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightModel {
    /// Rotor speed with the thrust axis centered. Hover happens here.
    pub base_rotor_speed: f64,
    /// How strongly a negative thrust axis slows the rotors, relative to
    /// how strongly a positive one speeds them up.
    pub descent_sensitivity: f64,
    /// Climb rate per unit of relative rotor overspeed.
    pub climb_gain: f64,
    /// Turn rate at full yaw deflection, rad/s.
    pub yaw_rate_gain: f64,
    /// Sideways speed at full pitch/roll deflection.
    pub lateral_gain: f64,
}

impl Default for FlightModel {
    fn default() -> Self {
        Self {
            base_rotor_speed: 10.0,
            descent_sensitivity: 0.5,
            climb_gain: 4.0,
            yaw_rate_gain: PI / 8.0,
            lateral_gain: 2.0,
        }
    }
}

impl FlightModel {
    /// Rotor speed for a thrust axis value. Pushing up scales the base rate
    /// linearly; pulling down does the same at reduced sensitivity, so
    /// descending is softer than climbing.
    pub fn rotor_speed(&self, thrust: f64) -> f64 {
        if thrust >= 0.0 {
            self.base_rotor_speed * (1.0 + thrust)
        } else {
            self.base_rotor_speed * (1.0 + self.descent_sensitivity * thrust)
        }
    }

    /// Advances `state` by `dt` seconds.
    ///
    /// The pitch/roll displacement is rotated into the world frame using the
    /// heading *after* this tick's yaw update.
    pub fn step(&self, state: &mut FlightState, controls: &ControlInputs, dt: f64) {
        let rs = self.rotor_speed(controls.thrust_yaw.y);
        state.rotor_phase += rs * dt;

        let v = &mut state.vehicle;
        v.z += (rs / self.base_rotor_speed - 1.0) * self.climb_gain * dt;
        v.yaw += -controls.thrust_yaw.x * self.yaw_rate_gain * dt;

        let dx = self.lateral_gain * controls.pitch_roll.x * dt;
        let dy = self.lateral_gain * controls.pitch_roll.y * dt;
        let (sin, cos) = v.yaw.sin_cos();
        v.x += cos * dx - sin * dy;
        v.y += sin * dx + cos * dy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn controls(thrust_yaw: (f64, f64), pitch_roll: (f64, f64)) -> ControlInputs {
        ControlInputs {
            thrust_yaw: KnobValue::new(thrust_yaw.0, thrust_yaw.1),
            pitch_roll: KnobValue::new(pitch_roll.0, pitch_roll.1),
        }
    }

    #[test]
    fn climb_from_half_thrust() {
        let model = FlightModel::default();
        let mut state = FlightState::default();

        assert_eq!(model.rotor_speed(0.5), 15.0);
        model.step(&mut state, &controls((0.0, 0.5), (0.0, 0.0)), 0.1);

        assert!((state.vehicle.z - (2.5 + 0.2)).abs() < EPS);
        assert!((state.rotor_phase - 1.5).abs() < EPS);
        assert_eq!(state.vehicle.x, 0.0);
        assert_eq!(state.vehicle.y, 0.0);
        assert_eq!(state.vehicle.yaw, 0.0);
    }

    #[test]
    fn descent_is_half_as_sensitive() {
        let model = FlightModel::default();
        assert_eq!(model.rotor_speed(-0.5), 7.5);
        assert_eq!(model.rotor_speed(-1.0), 5.0);
        assert_eq!(model.rotor_speed(1.0), 20.0);

        let mut state = FlightState::default();
        model.step(&mut state, &controls((0.0, -0.5), (0.0, 0.0)), 0.1);
        assert!((state.vehicle.z - (2.5 - 0.1)).abs() < EPS);
    }

    #[test]
    fn centered_knobs_hover() {
        let model = FlightModel::default();
        let mut state = FlightState::default();
        for _ in 0..100 {
            model.step(&mut state, &ControlInputs::default(), 0.1);
        }
        assert_eq!(state.vehicle, VehicleState::START);
        assert!((state.rotor_phase - 100.0).abs() < 1e-9);
    }

    #[test]
    fn yaw_axis_turns_the_other_way() {
        let model = FlightModel::default();
        let mut state = FlightState::default();
        model.step(&mut state, &controls((1.0, 0.0), (0.0, 0.0)), 1.0);
        assert!((state.vehicle.yaw + PI / 8.0).abs() < EPS);
    }

    #[test]
    fn forward_at_zero_heading_is_plus_y() {
        let model = FlightModel::default();
        let mut state = FlightState::default();
        model.step(&mut state, &controls((0.0, 0.0), (0.0, 1.0)), 0.5);
        assert!(state.vehicle.x.abs() < EPS);
        assert!((state.vehicle.y - 1.0).abs() < EPS);
    }

    #[test]
    fn lateral_motion_uses_the_updated_heading() {
        let model = FlightModel::default();
        let mut state = FlightState::default();
        // Yaw axis -1 for 4s turns by +pi/2, so "forward" ends up as -x.
        model.step(&mut state, &controls((-1.0, 0.0), (0.0, 1.0)), 4.0);

        assert!((state.vehicle.yaw - PI / 2.0).abs() < EPS);
        assert!((state.vehicle.x + 8.0).abs() < 1e-9);
        assert!(state.vehicle.y.abs() < 1e-9);
    }

    #[test]
    fn same_inputs_same_trajectory() {
        let model = FlightModel::default();
        let inputs: Vec<(ControlInputs, f64)> = (0..500)
            .map(|i| {
                let t = i as f64 * 0.05;
                (
                    controls((t.sin() * 0.7, (t * 0.3).cos()), ((t * 1.7).cos(), -t.sin())),
                    0.1 + 0.01 * (t * 3.0).sin(),
                )
            })
            .collect();

        let run = || {
            let mut state = FlightState::default();
            inputs
                .iter()
                .map(|(c, dt)| {
                    model.step(&mut state, c, *dt);
                    state
                })
                .collect::<Vec<_>>()
        };

        let first = run();
        let second = run();
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.vehicle.x.to_bits(), b.vehicle.x.to_bits());
            assert_eq!(a.vehicle.y.to_bits(), b.vehicle.y.to_bits());
            assert_eq!(a.vehicle.z.to_bits(), b.vehicle.z.to_bits());
            assert_eq!(a.vehicle.yaw.to_bits(), b.vehicle.yaw.to_bits());
            assert_eq!(a.rotor_phase.to_bits(), b.rotor_phase.to_bits());
        }
    }
}
