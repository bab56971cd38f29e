//! Hardware stand-ins for running the sampler off the brain.
//!
//! Both types are cheap handles over shared state: keep a clone to change
//! readings or time after the original has been moved into a sampler or log.

use alloc::rc::Rc;
use core::{
    cell::{Cell, RefCell},
    time::Duration,
};

use crate::{
    sensor::{Axis, Inertial, SensorError},
    telemetry::Clock,
};

#[derive(Debug, Default)]
struct ScriptState {
    rotation: f64,
    orientation: [f64; 3],
    calibrating_polls: usize,
    calibrations: usize,
    rotation_reads: usize,
    /// Fails every operation.
    fault: Option<SensorError>,
    /// Fails orientation reads only.
    orientation_fault: Option<SensorError>,
}

/// Inertial sensor whose readings are set by the test.
#[derive(Debug, Clone)]
pub struct ScriptedInertial {
    port: u8,
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedInertial {
    pub fn new(port: u8) -> Self {
        Self {
            port,
            state: Rc::default(),
        }
    }

    /// Reports calibrating for the next `polls` status checks after
    /// calibration is started.
    pub fn calibrating_for(self, polls: usize) -> Self {
        self.state.borrow_mut().calibrating_polls = polls;
        self
    }

    pub fn failing(self, error: SensorError) -> Self {
        self.set_fault(Some(error));
        self
    }

    pub fn set_rotation(&self, degrees: f64) {
        self.state.borrow_mut().rotation = degrees;
    }

    pub fn set_orientation(&self, roll: f64, pitch: f64, yaw: f64) {
        self.state.borrow_mut().orientation = [roll, pitch, yaw];
    }

    pub fn set_fault(&self, fault: Option<SensorError>) {
        self.state.borrow_mut().fault = fault;
    }

    pub fn set_orientation_fault(&self, fault: Option<SensorError>) {
        self.state.borrow_mut().orientation_fault = fault;
    }

    pub fn calibrations(&self) -> usize {
        self.state.borrow().calibrations
    }

    pub fn rotation_reads(&self) -> usize {
        self.state.borrow().rotation_reads
    }

    fn check(&self) -> Result<(), SensorError> {
        match self.state.borrow().fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Inertial for ScriptedInertial {
    fn port(&self) -> u8 {
        self.port
    }

    fn rotation(&self) -> Result<f64, SensorError> {
        self.check()?;
        let mut state = self.state.borrow_mut();
        state.rotation_reads += 1;
        Ok(state.rotation)
    }

    fn orientation(&self, axis: Axis) -> Result<f64, SensorError> {
        self.check()?;
        let state = self.state.borrow();
        if let Some(err) = state.orientation_fault {
            return Err(err);
        }
        Ok(match axis {
            Axis::Roll => state.orientation[0],
            Axis::Pitch => state.orientation[1],
            Axis::Yaw => state.orientation[2],
        })
    }

    fn calibrate(&mut self) -> Result<(), SensorError> {
        self.check()?;
        self.state.borrow_mut().calibrations += 1;
        Ok(())
    }

    fn is_calibrating(&self) -> Result<bool, SensorError> {
        self.check()?;
        let mut state = self.state.borrow_mut();
        if state.calibrations > 0 && state.calibrating_polls > 0 {
            state.calibrating_polls -= 1;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
