use vex_sdk::V5_DeviceT;
use vexide::{
    devices::{
        smart::imu::{InertialError, InertialSensor},
        PortError,
    },
    prelude::*,
};

use crate::sensor::{Axis, Inertial, SensorError};

/// V5 inertial sensor on a smart port.
pub struct V5Inertial {
    sensor: InertialSensor,
    port: u8,
}

impl V5Inertial {
    pub fn new(port: SmartPort) -> Self {
        let number = port.number();
        Self {
            sensor: InertialSensor::new(port),
            port: number,
        }
    }

    fn device(&self) -> V5_DeviceT {
        // SAFETY: the port number came from an owned `SmartPort`.
        unsafe { vex_sdk::vexDeviceGetByIndex(u32::from(self.port - 1)) }
    }

    fn ensure_ready(&self) -> Result<(), SensorError> {
        if self.sensor.is_calibrating().map_err(sensor_error)? {
            return Err(SensorError::StillCalibrating);
        }
        Ok(())
    }
}

impl Inertial for V5Inertial {
    fn port(&self) -> u8 {
        self.port
    }

    fn rotation(&self) -> Result<f64, SensorError> {
        self.sensor.rotation().map_err(sensor_error)
    }

    fn orientation(&self, axis: Axis) -> Result<f64, SensorError> {
        self.ensure_ready()?;
        // Radians, with `a` = pitch, `b` = roll, `c` = yaw.
        let euler = self.sensor.euler().map_err(sensor_error)?;
        let radians = match axis {
            Axis::Roll => euler.b,
            Axis::Pitch => euler.a,
            Axis::Yaw => euler.c,
        };
        Ok(radians.to_degrees())
    }

    fn calibrate(&mut self) -> Result<(), SensorError> {
        // `InertialSensor::calibrate` returns a future that also waits for the
        // sensor to finish; `calibrate_all` only needs the reset started.
        self.sensor.is_calibrating().map_err(sensor_error)?;
        // SAFETY: the device was validated as a connected inertial sensor.
        unsafe { vex_sdk::vexDeviceImuReset(self.device()) };
        Ok(())
    }

    fn is_calibrating(&self) -> Result<bool, SensorError> {
        self.sensor.is_calibrating().map_err(sensor_error)
    }
}

fn sensor_error(err: InertialError) -> SensorError {
    match err {
        InertialError::StillCalibrating => SensorError::StillCalibrating,
        InertialError::Port {
            source: PortError::Disconnected,
        } => SensorError::Disconnected,
        InertialError::Port {
            source: PortError::IncorrectDevice,
        } => SensorError::WrongDevice,
        _ => SensorError::BadStatus,
    }
}
