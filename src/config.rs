//! Static program configuration.
//!
//! Read once at startup from JSON. Every field has a default, so an empty
//! object (`{}`) yields the stock two-sensor bumper program.

use alloc::{string::String, vec, vec::Vec};
use core::{fmt, time::Duration};

use serde::Deserialize;

/// How a press of the sample button is turned into telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    /// One `"sample"` record per press. Read failures become `"error"`
    /// records and never reach the dispatcher.
    #[default]
    Logged,
    /// Snaps sensor 0 to the snap step and writes a `"rotations"` /
    /// `"orientations"` record pair. Read failures propagate.
    Snapped,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    pub delay_ms: u64,
    pub interval_ms: u64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            interval_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: SampleMode,
    /// Smart ports with inertial sensors, in sampling order.
    pub inertial_ports: Vec<u8>,
    /// Three-wire port (`a`..=`h`) the bumper is plugged into.
    pub bumper_port: char,
    /// `(group, name)` tagging every record this program writes.
    pub channel: (String, String),
    pub flush: FlushConfig,
    pub calibration_poll_ms: u64,
    pub snap_step: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: SampleMode::Logged,
            inertial_ports: vec![3, 2],
            bumper_port: 'a',
            channel: ("inertial".into(), "inertial".into()),
            flush: FlushConfig::default(),
            calibration_poll_ms: 100,
            snap_step: 90.0,
        }
    }
}

impl Config {
    /// Parses and validates a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inertial_ports.is_empty() {
            return Err(ConfigError::NoSensors);
        }
        for (i, &port) in self.inertial_ports.iter().enumerate() {
            if !(1..=21).contains(&port) {
                return Err(ConfigError::InvalidSmartPort(port));
            }
            if self.inertial_ports[..i].contains(&port) {
                return Err(ConfigError::DuplicateSmartPort(port));
            }
        }
        if self.bumper_index().is_none() {
            return Err(ConfigError::InvalidAdiPort(self.bumper_port));
        }
        if self.flush.interval_ms == 0 {
            return Err(ConfigError::ZeroFlushInterval);
        }
        if !self.snap_step.is_finite() || self.snap_step <= 0.0 {
            return Err(ConfigError::InvalidSnapStep(self.snap_step));
        }
        Ok(())
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush.delay_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush.interval_ms)
    }

    pub fn calibration_poll(&self) -> Duration {
        Duration::from_millis(self.calibration_poll_ms)
    }

    /// Zero-based index of the bumper's three-wire port, if it names one.
    pub fn bumper_index(&self) -> Option<u8> {
        match self.bumper_port.to_ascii_lowercase() {
            port @ 'a'..='h' => Some(port as u8 - b'a'),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    NoSensors,
    InvalidSmartPort(u8),
    DuplicateSmartPort(u8),
    InvalidAdiPort(char),
    ZeroFlushInterval,
    InvalidSnapStep(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "malformed configuration: {err}"),
            Self::NoSensors => f.write_str("no inertial sensor ports configured"),
            Self::InvalidSmartPort(port) => {
                write!(f, "smart port {port} is out of range 1..=21")
            }
            Self::DuplicateSmartPort(port) => write!(f, "smart port {port} is listed twice"),
            Self::InvalidAdiPort(port) => write!(f, "three-wire port {port:?} is not a..=h"),
            Self::ZeroFlushInterval => f.write_str("flush interval must be non-zero"),
            Self::InvalidSnapStep(step) => {
                write!(f, "snap step {step} must be finite and positive")
            }
        }
    }
}

impl core::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_stock_program() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.inertial_ports, [3, 2]);
        assert_eq!(config.flush_interval(), Duration::from_secs(10));
        assert_eq!(config.calibration_poll(), Duration::from_millis(100));
        assert_eq!(config.bumper_index(), Some(0));
    }

    #[test]
    fn reads_snapped_mode() {
        let config = Config::from_json(
            r#"{
                "mode": "snapped",
                "inertial_ports": [5, 6],
                "bumper_port": "C",
                "channel": ["turntable", "imu"],
                "flush": { "interval_ms": 2500 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.mode, SampleMode::Snapped);
        assert_eq!(config.channel, ("turntable".into(), "imu".into()));
        assert_eq!(config.flush.delay_ms, 0);
        assert_eq!(config.flush_interval(), Duration::from_millis(2500));
        assert_eq!(config.bumper_index(), Some(2));
    }

    #[test]
    fn rejects_bad_ports() {
        assert!(matches!(
            Config::from_json(r#"{ "inertial_ports": [] }"#),
            Err(ConfigError::NoSensors)
        ));
        assert!(matches!(
            Config::from_json(r#"{ "inertial_ports": [3, 22] }"#),
            Err(ConfigError::InvalidSmartPort(22))
        ));
        assert!(matches!(
            Config::from_json(r#"{ "inertial_ports": [3, 3] }"#),
            Err(ConfigError::DuplicateSmartPort(3))
        ));
        assert!(matches!(
            Config::from_json(r#"{ "bumper_port": "z" }"#),
            Err(ConfigError::InvalidAdiPort('z'))
        ));
        let config = Config {
            bumper_port: 'é',
            ..Config::default()
        };
        assert_eq!(config.bumper_index(), None);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidAdiPort('é'))));
    }

    #[test]
    fn rejects_bad_timing() {
        assert!(matches!(
            Config::from_json(r#"{ "flush": { "interval_ms": 0 } }"#),
            Err(ConfigError::ZeroFlushInterval)
        ));
        assert!(matches!(
            Config::from_json(r#"{ "snap_step": -90.0 }"#),
            Err(ConfigError::InvalidSnapStep(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Config::from_json("{ mode: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("malformed configuration"));
    }
}
