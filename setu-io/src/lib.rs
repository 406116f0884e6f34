//! SetuIO - Hardware seam for the Marga grid robot
//!
//! Capability interfaces for the two devices the navigation core talks
//! to: the open-loop motor controller with its five-word serial
//! vocabulary, and the ultrasonic rangefinder array across the front of
//! the chassis. Mock implementations live alongside the real ones so the
//! core runs the same against a bench as against the robot.

pub mod error;
pub mod mock;
pub mod motion;
pub mod range;

// Re-export commonly used types
pub use error::{Error, Result};
pub use motion::{MotionTransport, MotorCommand, SerialMotion};
pub use range::{RangeSensor, SensorArray, SensorMount};
