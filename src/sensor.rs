//! Inertial sensor interface and startup calibration.

use core::{fmt, future::Future, time::Duration};

/// One of the three Euler angles an inertial sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    /// Order in which orientations are flattened into a record.
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Nothing is plugged into the port.
    Disconnected,
    /// Something other than an inertial sensor is plugged into the port.
    WrongDevice,
    /// The sensor is still calibrating and cannot report readings.
    StillCalibrating,
    /// The sensor reported a status that could not be interpreted.
    BadStatus,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "no device connected",
            Self::WrongDevice => "connected device is not an inertial sensor",
            Self::StillCalibrating => "sensor is still calibrating",
            Self::BadStatus => "sensor reported an unreadable status",
        })
    }
}

impl core::error::Error for SensorError {}

/// An inertial sensor on a smart port.
///
/// Rotation is the unbounded accumulated heading in degrees; it is only
/// meaningful relative to an earlier reading.
pub trait Inertial {
    /// Smart port the sensor is plugged into.
    fn port(&self) -> u8;

    fn rotation(&self) -> Result<f64, SensorError>;

    fn orientation(&self, axis: Axis) -> Result<f64, SensorError>;

    /// Starts calibration without waiting for it to finish.
    fn calibrate(&mut self) -> Result<(), SensorError>;

    fn is_calibrating(&self) -> Result<bool, SensorError>;
}

/// Calibrates every sensor and waits for all of them to finish.
///
/// Calibration is started on all sensors first so they level in parallel.
/// `delay` is awaited with `poll` between status checks. There is no
/// timeout: a sensor that never finishes stalls startup.
///
/// Returns how many times `delay` was awaited.
pub async fn calibrate_all<S, D, F>(
    sensors: &mut [S],
    poll: Duration,
    mut delay: D,
) -> Result<usize, SensorError>
where
    S: Inertial,
    D: FnMut(Duration) -> F,
    F: Future<Output = ()>,
{
    for sensor in sensors.iter_mut() {
        sensor.calibrate()?;
    }

    let mut waits = 0;
    while any_calibrating(sensors)? {
        delay(poll).await;
        waits += 1;
    }

    log::debug!("{} inertial sensors calibrated after {waits} polls", sensors.len());
    Ok(waits)
}

fn any_calibrating<S: Inertial>(sensors: &[S]) -> Result<bool, SensorError> {
    for sensor in sensors {
        if sensor.is_calibrating()? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use core::{
        future::ready,
        pin::pin,
        task::{Context, Poll, Waker},
    };

    use super::*;
    use crate::mock::ScriptedInertial;

    fn block_on<F: Future>(future: F) -> F::Output {
        let mut future = pin!(future);
        let mut cx = Context::from_waker(Waker::noop());
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => output,
            Poll::Pending => panic!("future should complete without waking"),
        }
    }

    #[test]
    fn waits_for_the_slowest_sensor() {
        let mut sensors = [
            ScriptedInertial::new(3),
            ScriptedInertial::new(2).calibrating_for(5),
        ];
        let mut waited = Duration::ZERO;
        let waits = block_on(calibrate_all(
            &mut sensors,
            Duration::from_millis(100),
            |d| {
                waited += d;
                ready(())
            },
        ))
        .unwrap();

        assert_eq!(waits, 5);
        assert_eq!(waited, Duration::from_millis(500));
        assert!(sensors.iter().all(|s| s.calibrations() == 1));
    }

    #[test]
    fn already_calibrated_sensors_do_not_wait() {
        let mut sensors = [ScriptedInertial::new(1)];
        let waits =
            block_on(calibrate_all(&mut sensors, Duration::from_millis(100), |_| ready(()))).unwrap();
        assert_eq!(waits, 0);
    }

    #[test]
    fn unplugged_sensor_fails_calibration() {
        let mut sensors = [
            ScriptedInertial::new(3),
            ScriptedInertial::new(2).failing(SensorError::Disconnected),
        ];
        let result = block_on(calibrate_all(&mut sensors, Duration::from_millis(100), |_| ready(())));
        assert_eq!(result, Err(SensorError::Disconnected));
    }
}
