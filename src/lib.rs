//! Inertial sensor sampling for V5 robots.
//!
//! A press of a configured button samples every inertial sensor, converts
//! rotations to be relative to the first sample, and buffers the result as a
//! telemetry record. A periodic timer flushes the buffer to serial as JSON
//! lines.
//!
//! Everything except the `v5` module is hardware independent and runs
//! against [`mock`] sensors on the host.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod app;
pub mod config;
pub mod events;
pub mod mock;
pub mod ports;
pub mod sampler;
pub mod sensor;
pub mod telemetry;
#[cfg(feature = "v5")]
pub mod v5;

pub use app::{HandlerError, InertialLogger, OpenError};
pub use config::{Config, ConfigError, SampleMode};
pub use sampler::{Sample, SampleError, Sampler, SnappedSample, Snapper};
pub use sensor::{Axis, Inertial, SensorError};
pub use telemetry::{Channel, Clock, TelemetryLog, Timestamp};
