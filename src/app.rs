//! Startup and handler wiring for the sampling program.

use alloc::{string::ToString, vec::Vec};
use core::{fmt, future::Future, time::Duration};

use crate::{
    config::{Config, ConfigError, SampleMode},
    events::{Action, Button, Dispatcher, SubscriptionId},
    sampler::{SampleError, Sampler, Snapper},
    sensor::{self, Inertial, SensorError},
    telemetry::{Channel, Clock, TelemetryError, TelemetryLog, Timestamp},
};

/// Why [`InertialLogger::open`] refused to start.
#[derive(Debug)]
pub enum OpenError {
    Config(ConfigError),
    Sampler(SampleError),
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
            Self::Sampler(err) => write!(f, "could not build sampler: {err}"),
        }
    }
}

impl core::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Sampler(err) => Some(err),
        }
    }
}

/// Failure surfaced by [`InertialLogger::handle`] to the event loop.
#[derive(Debug)]
pub enum HandlerError {
    Sample(SampleError),
    Flush(TelemetryError),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sample(err) => write!(f, "sample failed: {err}"),
            Self::Flush(err) => write!(f, "flush failed: {err}"),
        }
    }
}

impl core::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Sample(err) => Some(err),
            Self::Flush(err) => Some(err),
        }
    }
}

impl From<SampleError> for HandlerError {
    fn from(err: SampleError) -> Self {
        Self::Sample(err)
    }
}

impl From<TelemetryError> for HandlerError {
    fn from(err: TelemetryError) -> Self {
        Self::Flush(err)
    }
}

/// Samples inertial sensors into a telemetry log.
pub struct InertialLogger<S, C> {
    mode: SampleMode,
    channel: Channel,
    sampler: Sampler<S>,
    telemetry: TelemetryLog<C>,
    calibration_poll: Duration,
    flush_delay: Duration,
    flush_interval: Duration,
}

impl<S: Inertial, C: Clock> InertialLogger<S, C> {
    /// Opens the telemetry log described by `config` and takes ownership of
    /// the sensors, which must be in `config.inertial_ports` order.
    ///
    /// `config` is validated first, so a hand-built one is held to the same
    /// rules as one read from JSON.
    pub fn open(config: &Config, sensors: Vec<S>, clock: C) -> Result<Self, OpenError> {
        config.validate().map_err(OpenError::Config)?;
        let sampler = Sampler::with_snapper(sensors, Snapper::new(config.snap_step))
            .map_err(OpenError::Sampler)?;
        let (group, name) = config.channel.clone();
        Ok(Self {
            mode: config.mode,
            channel: Channel(group, name),
            sampler,
            telemetry: TelemetryLog::open(clock),
            calibration_poll: config.calibration_poll(),
            flush_delay: config.flush_delay(),
            flush_interval: config.flush_interval(),
        })
    }

    pub fn mode(&self) -> SampleMode {
        self.mode
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn sampler(&self) -> &Sampler<S> {
        &self.sampler
    }

    pub fn telemetry(&self) -> &TelemetryLog<C> {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut TelemetryLog<C> {
        &mut self.telemetry
    }

    /// Calibrates every sensor, bracketed by `"calibrate"` and `"run"`
    /// records. Waits between status checks with `delay`.
    pub async fn calibrate<D, F>(&mut self, delay: D) -> Result<(), SensorError>
    where
        D: FnMut(Duration) -> F,
        F: Future<Output = ()>,
    {
        self.telemetry.log(&self.channel, "calibrate", "", Vec::new());
        sensor::calibrate_all(self.sampler.sensors_mut(), self.calibration_poll, delay).await?;
        self.telemetry.log(&self.channel, "run", "", Vec::new());
        Ok(())
    }

    /// Registers this program's triggers. The returned handles belong to
    /// the caller.
    pub fn subscribe(&self, dispatcher: &mut Dispatcher, now: Duration) -> Vec<SubscriptionId> {
        let mut subscriptions = Vec::new();
        subscriptions.push(dispatcher.repeated(
            Action::Flush,
            self.flush_delay,
            self.flush_interval,
            now,
        ));
        subscriptions.push(dispatcher.on_press(Button::Bumper, Action::Sample));
        if self.mode == SampleMode::Snapped {
            subscriptions.push(dispatcher.on_press(Button::ControllerA, Action::Sample));
            subscriptions.push(dispatcher.on_press(Button::ControllerB, Action::Flush));
        }
        subscriptions
    }

    pub fn handle<W: fmt::Write>(&mut self, action: Action, sink: &mut W) -> Result<(), HandlerError> {
        match action {
            Action::Sample => self.sample()?,
            Action::Flush => {
                self.flush(sink)?;
            }
        }
        Ok(())
    }

    /// Samples according to the configured mode.
    ///
    /// In [`SampleMode::Logged`] a failed read is written as an `"error"`
    /// record and `Ok` is returned.
    pub fn sample(&mut self) -> Result<(), SampleError> {
        match self.mode {
            SampleMode::Logged => {
                self.sample_logged();
                Ok(())
            }
            SampleMode::Snapped => self.sample_snapped().map(|_| ()),
        }
    }

    /// Writes one `"sample"` record, or one `"error"` record if any read
    /// fails.
    pub fn sample_logged(&mut self) -> Timestamp {
        match self.sampler.sample() {
            Ok(sample) => self
                .telemetry
                .log(&self.channel, "sample", "", sample.fields()),
            Err(err) => {
                log::warn!("{err}");
                self.telemetry
                    .log(&self.channel, "error", &err.to_string(), Vec::new())
            }
        }
    }

    /// Writes a `"rotations"` record and an `"orientations"` record sharing
    /// one timestamp. Nothing is written if a read fails.
    pub fn sample_snapped(&mut self) -> Result<Timestamp, SampleError> {
        let sample = self.sampler.sample_snapped()?;
        let timestamp =
            self.telemetry
                .log(&self.channel, "rotations", "", sample.rotation_fields());
        self.telemetry.log_with_timestamp(
            timestamp,
            &self.channel,
            "orientations",
            "",
            sample.orientation_fields(),
        );
        Ok(timestamp)
    }

    pub fn flush<W: fmt::Write>(&mut self, sink: &mut W) -> Result<usize, TelemetryError> {
        let written = self.telemetry.flush(sink)?;
        log::trace!("flushed {written} telemetry records");
        Ok(written)
    }
}
