//! Live robot state.

use std::time::Duration;

use crate::config::RobotConfig;
use crate::heading::Heading;
use crate::planning::CellId;

/// Seconds of motor run time per logical motion unit, measured by the
/// calibration procedure or taken from config until one has run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionTiming {
    /// One cell of forward travel
    pub forward_secs: f32,
    /// One 30 degree clockwise increment
    pub turn_right_secs: f32,
    /// One 30 degree counter-clockwise increment
    pub turn_left_secs: f32,
}

impl MotionTiming {
    /// Drive time for one forward cell.
    pub fn forward(&self) -> Duration {
        Duration::from_secs_f32(self.forward_secs)
    }

    /// Motor time for a quarter turn clockwise, three 30 degree
    /// increments.
    pub fn quarter_turn_right(&self) -> Duration {
        Duration::from_secs_f32(self.turn_right_secs * 3.0)
    }

    /// Motor time for a quarter turn counter-clockwise.
    pub fn quarter_turn_left(&self) -> Duration {
        Duration::from_secs_f32(self.turn_left_secs * 3.0)
    }
}

/// Where the robot is, which way it faces, and how long its motions
/// take.
///
/// `position` advances only once a forward step has fully completed and
/// `heading` only once a turn has, so a failure mid-command leaves the
/// tracked state at most one cell behind reality.
#[derive(Clone, Copy, Debug)]
pub struct RobotState {
    pub heading: Heading,
    pub position: CellId,
    pub timing: MotionTiming,
}

impl RobotState {
    /// Starting state from configuration.
    pub fn from_config(config: &RobotConfig) -> RobotState {
        RobotState {
            heading: config.start_heading,
            position: CellId(config.start_cell),
            timing: MotionTiming {
                forward_secs: config.forward_secs,
                turn_right_secs: config.turn_right_secs,
                turn_left_secs: config.turn_left_secs,
            },
        }
    }
}
