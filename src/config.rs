//! Tunables for a flying session, read from a RON file.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```ron
//! (
//!     tick_ms: 33,
//!     flight: (lateral_gain: 3.0),
//!     session: (target_count: 5),
//!     seed: Some(7),
//! )
//! ```

use crate::session::SessionSettings;
use crate::sim::FlightModel;

use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, time::Duration};

/// Everything the main loop and its parts can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Nominal time between two ticks, in milliseconds.
    pub tick_ms: u64,
    /// Simulated seconds per wall-clock second.
    pub step_scale: f64,
    /// Upper bound on one tick's simulated time, in seconds.
    pub max_step: f64,
    pub knob_radius: f64,
    pub flight: FlightModel,
    pub session: SessionSettings,
    pub connect_timeout_secs: f64,
    pub baud_rate: u32,
    /// Fixes target placement and difficult-mode headings when set.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            step_scale: 2.0,
            max_step: 0.25,
            knob_radius: 1.0,
            flight: FlightModel::default(),
            session: SessionSettings::default(),
            connect_timeout_secs: 10.0,
            baud_rate: 115200,
            seed: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    RonSpannedError(ron::de::SpannedError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "io error: {}", e),
            ConfigError::RonSpannedError(e) => write!(f, "bad config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<ron::de::SpannedError> for ConfigError {
    fn from(value: ron::de::SpannedError) -> Self {
        Self::RonSpannedError(value)
    }
}

impl SimConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::de::from_str(text)?)
    }

    /// The default config, or the one at `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.connect_timeout_secs).unwrap_or(Duration::ZERO)
    }

    /// Simulated seconds for a measured wall-clock delta, kept within
    /// `[0, max_step]` so a stalled frame does not teleport the vehicle.
    pub fn step_dt(&self, wall: Duration) -> f64 {
        let dt = wall.as_secs_f64() * self.step_scale;
        if dt.is_finite() {
            dt.clamp(0.0, self.max_step.max(0.0))
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn nominal_tick_integrates_a_tenth_of_a_second() {
        let config = SimConfig::default();
        assert!((config.step_dt(config.tick_interval()) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn long_stalls_are_clamped() {
        let config = SimConfig::default();
        assert_eq!(config.step_dt(Duration::from_secs(3)), 0.25);
        assert_eq!(config.step_dt(Duration::ZERO), 0.0);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = SimConfig::from_ron(
            "(tick_ms: 20, flight: (lateral_gain: 3.5), session: (target_count: 5), seed: Some(9))",
        )
        .unwrap();

        assert_eq!(config.tick_ms, 20);
        assert_eq!(config.flight.lateral_gain, 3.5);
        assert_eq!(config.flight.base_rotor_speed, 10.0);
        assert_eq!(config.session.target_count, 5);
        assert_eq!(config.session.body_radius, 1.5);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.baud_rate, 115200);
    }

    #[test]
    fn read_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(knob_radius: 2.0, connect_timeout_secs: 0.5)").unwrap();

        let config = SimConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.knob_radius, 2.0);
        assert_eq!(config.connect_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn errors_are_reported() {
        assert!(matches!(
            SimConfig::from_ron("(tick_ms: \"fast\")"),
            Err(ConfigError::RonSpannedError(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SimConfig::from_path(dir.path().join("missing.ron")),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn defaults_survive_a_round_trip() {
        let text = ron::ser::to_string(&SimConfig::default()).unwrap();
        assert_eq!(SimConfig::from_ron(&text).unwrap(), SimConfig::default());
    }
}
