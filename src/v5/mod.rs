//! Running the sampler on a V5 brain.

mod inertial;
mod logger;

use alloc::{vec, vec::Vec};
use core::{convert::Infallible, fmt, time::Duration};

use log::SetLoggerError;
use serde_json::Value;
use vexide::{
    core::{
        io::{stdout, Write},
        time::Instant,
    },
    prelude::*,
};

pub use self::{
    inertial::V5Inertial,
    logger::{drain_console, init_logger},
};
use crate::{
    app::{InertialLogger, OpenError},
    config::{Config, ConfigError},
    events::{Action, Button, Dispatcher},
    ports::PortTable,
    sensor::SensorError,
    telemetry::{Channel, Clock},
};

/// Time since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct BrainClock {
    start: Instant,
}

impl BrainClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for BrainClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for BrainClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Text sink over the brain's serial output.
pub struct SerialSink<W> {
    out: W,
}

impl<W: Write> SerialSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> fmt::Write for SerialSink<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

#[derive(Debug)]
pub enum StartupError {
    Logger(SetLoggerError),
    Config(ConfigError),
    PortUnavailable(u8),
    Open(OpenError),
    Calibration(SensorError),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logger(err) => write!(f, "could not install logger: {err}"),
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
            Self::PortUnavailable(port) => write!(f, "port {port} is not available"),
            Self::Open(err) => write!(f, "could not open sampler: {err}"),
            Self::Calibration(err) => write!(f, "calibration failed: {err}"),
        }
    }
}

impl core::error::Error for StartupError {}

/// Builds the program described by `config` and runs it until power off.
pub async fn run(peripherals: Peripherals, config: Config) -> Result<Infallible, StartupError> {
    init_logger().map_err(StartupError::Logger)?;
    config.validate().map_err(StartupError::Config)?;

    let mut smart_ports = PortTable::new([
        peripherals.port_1,
        peripherals.port_2,
        peripherals.port_3,
        peripherals.port_4,
        peripherals.port_5,
        peripherals.port_6,
        peripherals.port_7,
        peripherals.port_8,
        peripherals.port_9,
        peripherals.port_10,
        peripherals.port_11,
        peripherals.port_12,
        peripherals.port_13,
        peripherals.port_14,
        peripherals.port_15,
        peripherals.port_16,
        peripherals.port_17,
        peripherals.port_18,
        peripherals.port_19,
        peripherals.port_20,
        peripherals.port_21,
    ]);
    let sensors = config
        .inertial_ports
        .iter()
        .map(|&number| {
            smart_ports
                .take(number)
                .map(V5Inertial::new)
                .ok_or(StartupError::PortUnavailable(number))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut adi_ports = PortTable::new([
        peripherals.adi_a,
        peripherals.adi_b,
        peripherals.adi_c,
        peripherals.adi_d,
        peripherals.adi_e,
        peripherals.adi_f,
        peripherals.adi_g,
        peripherals.adi_h,
    ]);
    let bumper_number = config.bumper_index().map_or(0, |index| index + 1);
    let bumper = AdiDigitalIn::new(
        adi_ports
            .take(bumper_number)
            .ok_or(StartupError::PortUnavailable(bumper_number))?,
    );
    let controller = peripherals.primary_controller;

    let mut logger = InertialLogger::open(&config, sensors, BrainClock::new())
        .map_err(StartupError::Open)?;
    logger
        .calibrate(sleep)
        .await
        .map_err(StartupError::Calibration)?;
    log::info!("sampling {} inertial sensors in {:?} mode", config.inertial_ports.len(), config.mode);

    let mut dispatcher = Dispatcher::new();
    let _subscriptions = logger.subscribe(&mut dispatcher, logger.telemetry().now().as_duration());
    let mut sink = SerialSink::new(stdout().lock());

    loop {
        let now = logger.telemetry().now().as_duration();
        let actions = dispatcher.poll(now, |button| match button {
            Button::Bumper => bumper.is_high().unwrap_or_default(),
            Button::ControllerA => controller.button_a.is_pressed().unwrap_or_default(),
            Button::ControllerB => controller.button_b.is_pressed().unwrap_or_default(),
        });

        for action in actions {
            if action == Action::Flush {
                if let Some(console) = drain_console() {
                    logger.telemetry_mut().log(
                        &Channel::console(),
                        "console",
                        "",
                        vec![Value::String(console)],
                    );
                }
            }
            if let Err(err) = logger.handle(action, &mut sink) {
                log::error!("{action:?} handler failed: {err}");
            }
        }

        sleep(Controller::UPDATE_INTERVAL).await;
    }
}
