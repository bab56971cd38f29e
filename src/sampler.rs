//! Turns raw inertial readings into rotations relative to the first sample.

use alloc::vec::Vec;
use core::fmt;

use serde_json::Value;

use crate::sensor::{Axis, Inertial, SensorError};

/// Which reading failed while sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Rotation,
    Orientation(Axis),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotation => f.write_str("rotation"),
            Self::Orientation(Axis::Roll) => f.write_str("roll"),
            Self::Orientation(Axis::Pitch) => f.write_str("pitch"),
            Self::Orientation(Axis::Yaw) => f.write_str("yaw"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleError {
    NoSensors,
    Sensor {
        index: usize,
        port: u8,
        reading: Reading,
        source: SensorError,
    },
    /// A sensor returned NaN or an infinite value where a number is needed.
    NonFinite {
        index: usize,
        port: u8,
        reading: Reading,
    },
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSensors => f.write_str("sampler has no inertial sensors"),
            Self::Sensor {
                index,
                port,
                reading,
                source,
            } => write!(
                f,
                "inertial sensor {index} on port {port}: {reading} read failed: {source}"
            ),
            Self::NonFinite {
                index,
                port,
                reading,
            } => write!(
                f,
                "inertial sensor {index} on port {port}: {reading} is not a finite number"
            ),
        }
    }
}

impl core::error::Error for SampleError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Sensor { source, .. } => Some(source),
            Self::NoSensors | Self::NonFinite { .. } => None,
        }
    }
}

/// Rounds to the nearest multiple of `step` while carrying the rounding
/// residual into the next decision, so repeated rounding does not drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapper {
    step: f64,
    error: f64,
}

impl Snapper {
    pub const DEFAULT_STEP: f64 = 90.0;

    pub fn new(step: f64) -> Self {
        Self { step, error: 0.0 }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Residual left by the last snap.
    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn snap(&mut self, value: f64) -> f64 {
        // Ties go to even, so a value exactly half a step off does not
        // consistently round the same way.
        let snapped = libm::rint((value + self.error) / self.step) * self.step;
        self.error = snapped - value;
        snapped
    }
}

impl Default for Snapper {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STEP)
    }
}

/// One sample: relative rotations, then roll/pitch/yaw per sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub relative: Vec<f64>,
    pub orientations: Vec<f64>,
}

impl Sample {
    /// Record fields: every relative rotation followed by every orientation.
    pub fn fields(&self) -> Vec<Value> {
        self.relative
            .iter()
            .chain(&self.orientations)
            .map(|&v| Value::from(v))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnappedSample {
    /// Sensor 0's relative rotation snapped to the step.
    pub snapped: f64,
    pub sample: Sample,
}

impl SnappedSample {
    /// `"rotations"` fields: the snapped value, then every relative rotation.
    pub fn rotation_fields(&self) -> Vec<Value> {
        core::iter::once(self.snapped)
            .chain(self.sample.relative.iter().copied())
            .map(Value::from)
            .collect()
    }

    /// `"orientations"` fields.
    pub fn orientation_fields(&self) -> Vec<Value> {
        self.sample.orientations.iter().map(|&v| Value::from(v)).collect()
    }
}

/// Samples a fixed set of inertial sensors.
///
/// The first set of rotations read becomes the origin and is kept for the
/// sampler's lifetime.
#[derive(Debug)]
pub struct Sampler<S> {
    sensors: Vec<S>,
    origin: Option<Vec<f64>>,
    snapper: Snapper,
}

impl<S: Inertial> Sampler<S> {
    pub fn new(sensors: Vec<S>) -> Result<Self, SampleError> {
        Self::with_snapper(sensors, Snapper::default())
    }

    pub fn with_snapper(sensors: Vec<S>, snapper: Snapper) -> Result<Self, SampleError> {
        if sensors.is_empty() {
            return Err(SampleError::NoSensors);
        }
        Ok(Self {
            sensors,
            origin: None,
            snapper,
        })
    }

    pub fn sensors(&self) -> &[S] {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut [S] {
        &mut self.sensors
    }

    pub fn origin(&self) -> Option<&[f64]> {
        self.origin.as_deref()
    }

    pub fn snapper(&self) -> &Snapper {
        &self.snapper
    }

    pub fn sample(&mut self) -> Result<Sample, SampleError> {
        let relative = self.relative_rotations()?;
        let orientations = self.orientations()?;
        Ok(Sample {
            relative,
            orientations,
        })
    }

    /// Samples and snaps sensor 0's relative rotation.
    ///
    /// The snap residual is updated before orientations are read, so it
    /// advances even when an orientation read fails. A non-finite rotation
    /// leaves the residual untouched.
    pub fn sample_snapped(&mut self) -> Result<SnappedSample, SampleError> {
        let relative = self.relative_rotations()?;
        if !relative[0].is_finite() {
            return Err(SampleError::NonFinite {
                index: 0,
                port: self.sensors[0].port(),
                reading: Reading::Rotation,
            });
        }
        let snapped = self.snapper.snap(relative[0]);
        let orientations = self.orientations()?;
        Ok(SnappedSample {
            snapped,
            sample: Sample {
                relative,
                orientations,
            },
        })
    }

    fn relative_rotations(&mut self) -> Result<Vec<f64>, SampleError> {
        let current = self
            .sensors
            .iter()
            .enumerate()
            .map(|(index, sensor)| {
                sensor
                    .rotation()
                    .map_err(|source| sensor_error(index, sensor, Reading::Rotation, source))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if self.origin.is_none() {
            if let Some(index) = current.iter().position(|v| !v.is_finite()) {
                return Err(SampleError::NonFinite {
                    index,
                    port: self.sensors[index].port(),
                    reading: Reading::Rotation,
                });
            }
        }

        let origin = self.origin.get_or_insert_with(|| {
            log::info!("captured origin rotations {current:?}");
            current.clone()
        });

        Ok(current.iter().zip(origin.iter()).map(|(c, o)| c - o).collect())
    }

    fn orientations(&self) -> Result<Vec<f64>, SampleError> {
        let mut orientations = Vec::with_capacity(self.sensors.len() * Axis::ALL.len());
        for (index, sensor) in self.sensors.iter().enumerate() {
            for axis in Axis::ALL {
                let value = sensor.orientation(axis).map_err(|source| {
                    sensor_error(index, sensor, Reading::Orientation(axis), source)
                })?;
                orientations.push(value);
            }
        }
        Ok(orientations)
    }
}

fn sensor_error<S: Inertial>(
    index: usize,
    sensor: &S,
    reading: Reading,
    source: SensorError,
) -> SampleError {
    SampleError::Sensor {
        index,
        port: sensor.port(),
        reading,
        source,
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::mock::ScriptedInertial;

    fn two_sensors() -> (Sampler<ScriptedInertial>, ScriptedInertial, ScriptedInertial) {
        let a = ScriptedInertial::new(3);
        let b = ScriptedInertial::new(2);
        let sampler = Sampler::new(vec![a.clone(), b.clone()]).unwrap();
        (sampler, a, b)
    }

    #[test]
    fn first_sample_is_the_origin() {
        let (mut sampler, a, b) = two_sensors();
        a.set_rotation(10.0);
        b.set_rotation(20.0);

        let sample = sampler.sample().unwrap();
        assert_eq!(sample.relative, [0.0, 0.0]);
        assert_eq!(sampler.origin(), Some(&[10.0, 20.0][..]));
    }

    #[test]
    fn later_samples_are_relative_to_the_origin() {
        let (mut sampler, a, b) = two_sensors();
        a.set_rotation(10.0);
        b.set_rotation(20.0);
        sampler.sample().unwrap();

        a.set_rotation(100.0);
        b.set_rotation(-15.5);
        let sample = sampler.sample().unwrap();
        assert_eq!(sample.relative, [90.0, -35.5]);

        a.set_rotation(0.1);
        let sample = sampler.sample().unwrap();
        assert_eq!(sample.relative, [0.1 - 10.0, -35.5]);
        assert_eq!(sampler.origin(), Some(&[10.0, 20.0][..]));
    }

    #[test]
    fn orientations_are_flattened_sensor_then_axis() {
        let (mut sampler, a, b) = two_sensors();
        a.set_orientation(1.0, 2.0, 3.0);
        b.set_orientation(4.0, 5.0, 6.0);

        let sample = sampler.sample().unwrap();
        assert_eq!(sample.orientations, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(sample.fields().len(), 8);
        assert_eq!(sample.fields()[2], Value::from(1.0));
    }

    #[test]
    fn rotation_failure_names_the_sensor() {
        let (mut sampler, _, b) = two_sensors();
        b.set_fault(Some(SensorError::Disconnected));

        let err = sampler.sample().unwrap_err();
        assert_eq!(
            err,
            SampleError::Sensor {
                index: 1,
                port: 2,
                reading: Reading::Rotation,
                source: SensorError::Disconnected,
            }
        );
        assert_eq!(sampler.origin(), None);
        assert_eq!(
            err.to_string(),
            "inertial sensor 1 on port 2: rotation read failed: no device connected"
        );
    }

    #[test]
    fn origin_survives_an_orientation_failure() {
        let (mut sampler, a, _) = two_sensors();
        a.set_rotation(5.0);
        a.set_orientation_fault(Some(SensorError::StillCalibrating));

        let err = sampler.sample().unwrap_err();
        assert!(matches!(
            err,
            SampleError::Sensor {
                reading: Reading::Orientation(Axis::Roll),
                ..
            }
        ));
        assert_eq!(sampler.origin(), Some(&[5.0, 0.0][..]));
    }

    #[test]
    fn empty_sensor_set_is_rejected() {
        let sensors: Vec<ScriptedInertial> = Vec::new();
        assert_eq!(Sampler::new(sensors).unwrap_err(), SampleError::NoSensors);
    }

    #[test]
    fn quarter_turn_snaps_exactly() {
        let (mut sampler, a, b) = two_sensors();
        a.set_rotation(10.0);
        b.set_rotation(20.0);
        sampler.sample_snapped().unwrap();

        a.set_rotation(100.0);
        let sample = sampler.sample_snapped().unwrap();
        assert_eq!(sample.sample.relative, [90.0, 0.0]);
        assert_eq!(sample.snapped, 90.0);
        assert_eq!(sampler.snapper().error(), 0.0);
        assert_eq!(
            sample.rotation_fields(),
            [Value::from(90.0), Value::from(90.0), Value::from(0.0)]
        );
    }

    #[test]
    fn snap_error_reaches_a_fixed_point() {
        let mut snapper = Snapper::default();
        assert_eq!(snapper.snap(40.0), 0.0);
        assert_eq!(snapper.error(), -40.0);
        assert_eq!(snapper.snap(40.0), 0.0);
        assert_eq!(snapper.error(), -40.0);

        let mut snapper = Snapper::default();
        assert_eq!(snapper.snap(50.0), 90.0);
        assert_eq!(snapper.error(), 40.0);
        assert_eq!(snapper.snap(50.0), 90.0);
        assert_eq!(snapper.error(), 40.0);
    }

    #[test]
    fn snapped_values_stay_on_the_grid() {
        let mut snapper = Snapper::default();
        let readings = [3.0, 47.5, 91.0, 133.0, 181.2, 270.0, -44.0, -136.0, 359.9, 12.0];
        for value in readings {
            let prior = snapper.error();
            let snapped = snapper.snap(value);
            assert_eq!(libm::fmod(snapped, 90.0), 0.0, "{snapped} is off the grid");
            assert!((snapped - (value + prior)).abs() <= 45.0);
            assert_eq!(snapper.error(), snapped - value);
        }
    }

    #[test]
    fn half_step_ties_round_to_even() {
        assert_eq!(Snapper::default().snap(45.0), 0.0);
        assert_eq!(Snapper::default().snap(135.0), 180.0);
        assert_eq!(Snapper::new(10.0).snap(14.0), 10.0);
    }

    #[test]
    fn non_finite_rotation_leaves_the_residual_alone() {
        let (mut sampler, a, _) = two_sensors();
        a.set_rotation(40.0);
        sampler.sample_snapped().unwrap();
        a.set_rotation(100.0);
        sampler.sample_snapped().unwrap();
        assert_eq!(sampler.snapper().error(), 30.0);

        a.set_rotation(f64::NAN);
        let err = sampler.sample_snapped().unwrap_err();
        assert_eq!(
            err,
            SampleError::NonFinite {
                index: 0,
                port: 3,
                reading: Reading::Rotation,
            }
        );
        assert_eq!(sampler.snapper().error(), 30.0);

        a.set_rotation(f64::INFINITY);
        assert!(sampler.sample_snapped().is_err());

        a.set_rotation(130.0);
        let sample = sampler.sample_snapped().unwrap();
        assert!(sample.snapped.is_finite());
        assert!(sampler.snapper().error().is_finite());
        assert_eq!(sample.snapped, 90.0);
        assert_eq!(sampler.snapper().error(), 0.0);
        assert_eq!(
            sample.rotation_fields(),
            [Value::from(90.0), Value::from(90.0), Value::from(0.0)]
        );
    }

    #[test]
    fn non_finite_first_reading_is_not_the_origin() {
        let (mut sampler, _, b) = two_sensors();
        b.set_rotation(f64::NAN);
        assert_eq!(
            sampler.sample().unwrap_err(),
            SampleError::NonFinite {
                index: 1,
                port: 2,
                reading: Reading::Rotation,
            }
        );
        assert_eq!(sampler.origin(), None);

        b.set_rotation(7.0);
        assert_eq!(sampler.sample().unwrap().relative, [0.0, 0.0]);
        assert_eq!(sampler.origin(), Some(&[0.0, 7.0][..]));
    }

    #[test]
    fn snap_residual_advances_before_orientation_reads() {
        let (mut sampler, a, _) = two_sensors();
        sampler.sample_snapped().unwrap();

        a.set_rotation(30.0);
        a.set_orientation_fault(Some(SensorError::BadStatus));
        assert!(sampler.sample_snapped().is_err());
        assert_eq!(sampler.snapper().error(), -30.0);
    }
}
