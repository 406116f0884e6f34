//! Mock hardware for development and testing.
//!
//! Both mocks share their state through `Arc`, so a test can keep a
//! handle while the controller owns the boxed trait object.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Result;
use crate::motion::{MotionTransport, MotorCommand};
use crate::range::{RangeSensor, SensorArray};

/// Mock motor transport that records every command it is sent.
#[derive(Clone)]
pub struct MockMotion {
    log: Arc<Mutex<Vec<MotorCommand>>>,
}

impl MockMotion {
    /// Create new mock motor transport
    pub fn new() -> Self {
        MockMotion {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Commands sent so far, in order.
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.log.lock().clone()
    }

    /// Forget the recorded commands.
    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl Default for MockMotion {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionTransport for MockMotion {
    fn send(&mut self, command: MotorCommand) -> Result<()> {
        log::trace!("mock motor: {}", command);
        self.log.lock().push(command);
        Ok(())
    }
}

/// Mock rangefinder replaying scripted readings.
///
/// Queued readings are popped in order; once the script runs dry the
/// sensor reports a constant fallback. Cloned handles share the script.
#[derive(Clone)]
pub struct ScriptedRange {
    script: Arc<Mutex<VecDeque<f32>>>,
    fallback: f32,
}

impl ScriptedRange {
    /// Sensor that reads `fallback` centimeters until scripted otherwise.
    pub fn constant(fallback: f32) -> Self {
        ScriptedRange {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
        }
    }

    /// Queue one reading ahead of the fallback.
    pub fn push_reading(&self, centimeters: f32) {
        self.script.lock().push_back(centimeters);
    }

    /// Queue several readings at once.
    pub fn push_readings(&self, readings: &[f32]) {
        self.script.lock().extend(readings.iter().copied());
    }
}

impl RangeSensor for ScriptedRange {
    fn sample(&mut self, _timeout: Duration) -> Result<f32> {
        Ok(self.script.lock().pop_front().unwrap_or(self.fallback))
    }
}

/// One scripted rangefinder per mount, with the handles kept around so a
/// test can feed readings while the boxed array is in use.
pub struct SensorRig {
    pub left_60: ScriptedRange,
    pub left_30: ScriptedRange,
    pub forward: ScriptedRange,
    pub right_30: ScriptedRange,
    pub right_60: ScriptedRange,
}

impl SensorRig {
    /// Rig whose sensors all read `clear_distance` centimeters until
    /// told otherwise.
    pub fn new(clear_distance: f32) -> Self {
        SensorRig {
            left_60: ScriptedRange::constant(clear_distance),
            left_30: ScriptedRange::constant(clear_distance),
            forward: ScriptedRange::constant(clear_distance),
            right_30: ScriptedRange::constant(clear_distance),
            right_60: ScriptedRange::constant(clear_distance),
        }
    }

    /// Box clones of the five sensors into an array.
    pub fn array(&self) -> SensorArray {
        SensorArray::new(
            Box::new(self.left_60.clone()),
            Box::new(self.left_30.clone()),
            Box::new(self.forward.clone()),
            Box::new(self.right_30.clone()),
            Box::new(self.right_60.clone()),
        )
    }
}
