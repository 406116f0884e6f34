//! Rangefinder interfaces.
//!
//! Five ultrasonic rangefinders cover the front arc of the robot. The
//! navigation core samples them one at a time; echo timing happens below
//! this seam.

use std::time::Duration;

use crate::error::Result;

/// Mount positions of the rangefinders, left to right across the arc.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorMount {
    /// 60 degrees left of travel
    Left60,
    /// 30 degrees left of travel
    Left30,
    /// Straight ahead
    Forward,
    /// 30 degrees right of travel
    Right30,
    /// 60 degrees right of travel
    Right60,
}

impl SensorMount {
    /// All mounts, left to right.
    pub const ALL: [SensorMount; 5] = [
        SensorMount::Left60,
        SensorMount::Left30,
        SensorMount::Forward,
        SensorMount::Right30,
        SensorMount::Right60,
    ];

    /// Mount name for logs.
    pub fn label(self) -> &'static str {
        match self {
            SensorMount::Left60 => "left_60",
            SensorMount::Left30 => "left_30",
            SensorMount::Forward => "fwd",
            SensorMount::Right30 => "rgt_30",
            SensorMount::Right60 => "rgt_60",
        }
    }

    fn index(self) -> usize {
        match self {
            SensorMount::Left60 => 0,
            SensorMount::Left30 => 1,
            SensorMount::Forward => 2,
            SensorMount::Right30 => 3,
            SensorMount::Right60 => 4,
        }
    }
}

impl std::fmt::Display for SensorMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Single-shot distance measurement.
pub trait RangeSensor: Send {
    /// Measure the distance to the nearest surface, in centimeters.
    ///
    /// Blocks for at most `timeout` waiting for the echo.
    fn sample(&mut self, timeout: Duration) -> Result<f32>;
}

/// The five rangefinders as one addressable unit.
pub struct SensorArray {
    sensors: [Box<dyn RangeSensor>; 5],
}

impl SensorArray {
    /// Assemble the array from its five mounts, left to right.
    pub fn new(
        left_60: Box<dyn RangeSensor>,
        left_30: Box<dyn RangeSensor>,
        forward: Box<dyn RangeSensor>,
        right_30: Box<dyn RangeSensor>,
        right_60: Box<dyn RangeSensor>,
    ) -> Self {
        SensorArray {
            sensors: [left_60, left_30, forward, right_30, right_60],
        }
    }

    /// Sample one mount.
    pub fn sample(&mut self, mount: SensorMount, timeout: Duration) -> Result<f32> {
        let reading = self.sensors[mount.index()].sample(timeout)?;
        log::trace!("{}: {:.1}cm", mount.label(), reading);
        Ok(reading)
    }
}
