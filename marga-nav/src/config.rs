//! Configuration loading for MargaNav

use std::path::Path;

use serde::Deserialize;

use crate::error::{MargaError, Result};
use crate::heading::Heading;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct MargaConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

/// Grid dimensions and the obstacles surveyed before the robot moves
#[derive(Clone, Debug, Deserialize)]
pub struct GridConfig {
    /// Grid length in rows, frame included (default: 12)
    #[serde(default = "default_length")]
    pub length: usize,

    /// Grid width in columns, frame included (default: 15)
    #[serde(default = "default_width")]
    pub width: usize,

    /// Cell ids of obstacles known up front (default: none)
    #[serde(default)]
    pub obstacles: Vec<usize>,
}

/// Robot starting state and fallback motion timing
#[derive(Clone, Debug, Deserialize)]
pub struct RobotConfig {
    /// Cell the robot starts on (default: 16)
    #[serde(default = "default_start_cell")]
    pub start_cell: usize,

    /// Heading the robot starts with (default: S)
    #[serde(default = "default_start_heading")]
    pub start_heading: Heading,

    /// Seconds of drive per forward cell, until calibrated (default: 0.448)
    #[serde(default = "default_forward_secs")]
    pub forward_secs: f32,

    /// Seconds per 30 degree clockwise increment (default: 0.3293)
    #[serde(default = "default_turn_right_secs")]
    pub turn_right_secs: f32,

    /// Seconds per 30 degree counter-clockwise increment (default: 0.4621)
    #[serde(default = "default_turn_left_secs")]
    pub turn_left_secs: f32,
}

/// Route execution parameters
#[derive(Clone, Debug, Deserialize)]
pub struct NavigationConfig {
    /// Obstacle distance that aborts a forward step, in cm (default: 15.0)
    #[serde(default = "default_min_distance")]
    pub min_distance_cm: f32,

    /// Micro-steps each forward drive is split into (default: 5)
    #[serde(default = "default_subdivisions")]
    pub forward_subdivisions: u32,

    /// Replans allowed per run before giving up (default: 8)
    #[serde(default = "default_max_replans")]
    pub max_replans: u32,
}

/// Calibration procedure parameters
#[derive(Clone, Debug, Deserialize)]
pub struct CalibrationConfig {
    /// Duration of the forward measurement drive (default: 2.0)
    #[serde(default = "default_drive_secs")]
    pub drive_secs: f32,

    /// Distance one cell stands for, in cm (default: 20.0)
    #[serde(default = "default_reference_distance")]
    pub reference_distance_cm: f32,

    /// Band around the baseline that counts as re-converged (default: 1.5)
    #[serde(default = "default_tolerance")]
    pub tolerance_cm: f32,

    /// Head start before convergence polling begins (default: 1.0)
    #[serde(default = "default_spin_up")]
    pub spin_up_secs: f32,

    /// Pause between calibration phases (default: 2.0)
    #[serde(default = "default_settle")]
    pub settle_secs: f32,

    /// Interval between convergence polls, in ms (default: 10)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Longest a turn probe may spin before failing (default: 30.0)
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: f32,
}

/// Motor transport selection
#[derive(Clone, Debug, Deserialize)]
pub struct MotionConfig {
    /// "serial" for the drive firmware, "sim" for a logged mock (default: sim)
    #[serde(default = "default_motion_mode")]
    pub mode: String,

    /// Serial port path (default: /dev/ttyACM0)
    #[serde(default = "default_port")]
    pub port: String,

    /// Serial baud rate (default: 9600)
    #[serde(default = "default_baud")]
    pub baud: u32,
}

/// Rangefinder parameters
#[derive(Clone, Debug, Deserialize)]
pub struct SensorConfig {
    /// Longest wait for a single echo, in ms (default: 60)
    #[serde(default = "default_sample_timeout")]
    pub sample_timeout_ms: u64,

    /// Distance simulated sensors report when nothing is scripted (default: 400.0)
    #[serde(default = "default_clear_distance")]
    pub clear_distance_cm: f32,
}

/// Control surface settings
#[derive(Clone, Debug, Deserialize)]
pub struct ControlConfig {
    /// TCP bind address of the command listener (default: 0.0.0.0:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl MargaConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MargaError::Config(format!("Failed to read config file: {}", e)))?;
        let config: MargaConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.grid.length < 3 || self.grid.width < 3 {
            return Err(MargaError::Config(format!(
                "grid {}x{} leaves no interior cells",
                self.grid.length, self.grid.width
            )));
        }
        if self.navigation.forward_subdivisions == 0 {
            return Err(MargaError::Config(
                "forward_subdivisions must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("robot.forward_secs", self.robot.forward_secs),
            ("robot.turn_right_secs", self.robot.turn_right_secs),
            ("robot.turn_left_secs", self.robot.turn_left_secs),
            ("navigation.min_distance_cm", self.navigation.min_distance_cm),
            ("calibration.drive_secs", self.calibration.drive_secs),
            (
                "calibration.reference_distance_cm",
                self.calibration.reference_distance_cm,
            ),
            ("calibration.tolerance_cm", self.calibration.tolerance_cm),
            ("calibration.max_wait_secs", self.calibration.max_wait_secs),
        ] {
            if !(value > 0.0) {
                return Err(MargaError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("calibration.spin_up_secs", self.calibration.spin_up_secs),
            ("calibration.settle_secs", self.calibration.settle_secs),
        ] {
            if !(value >= 0.0) {
                return Err(MargaError::Config(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for MargaConfig {
    fn default() -> Self {
        MargaConfig {
            grid: GridConfig::default(),
            robot: RobotConfig::default(),
            navigation: NavigationConfig::default(),
            calibration: CalibrationConfig::default(),
            motion: MotionConfig::default(),
            sensors: SensorConfig::default(),
            control: ControlConfig::default(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            length: default_length(),
            width: default_width(),
            obstacles: Vec::new(),
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        RobotConfig {
            start_cell: default_start_cell(),
            start_heading: default_start_heading(),
            forward_secs: default_forward_secs(),
            turn_right_secs: default_turn_right_secs(),
            turn_left_secs: default_turn_left_secs(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            min_distance_cm: default_min_distance(),
            forward_subdivisions: default_subdivisions(),
            max_replans: default_max_replans(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            drive_secs: default_drive_secs(),
            reference_distance_cm: default_reference_distance(),
            tolerance_cm: default_tolerance(),
            spin_up_secs: default_spin_up(),
            settle_secs: default_settle(),
            poll_interval_ms: default_poll_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            mode: default_motion_mode(),
            port: default_port(),
            baud: default_baud(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            sample_timeout_ms: default_sample_timeout(),
            clear_distance_cm: default_clear_distance(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            bind_address: default_bind_address(),
        }
    }
}

// Default value functions
fn default_length() -> usize {
    12
}

fn default_width() -> usize {
    15
}

fn default_start_cell() -> usize {
    16
}

fn default_start_heading() -> Heading {
    Heading::South
}

fn default_forward_secs() -> f32 {
    0.448
}

fn default_turn_right_secs() -> f32 {
    0.3293
}

fn default_turn_left_secs() -> f32 {
    0.4621
}

fn default_min_distance() -> f32 {
    15.0
}

fn default_subdivisions() -> u32 {
    5
}

fn default_max_replans() -> u32 {
    8
}

fn default_drive_secs() -> f32 {
    2.0
}

fn default_reference_distance() -> f32 {
    20.0
}

fn default_tolerance() -> f32 {
    1.5
}

fn default_spin_up() -> f32 {
    1.0
}

fn default_settle() -> f32 {
    2.0
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_wait() -> f32 {
    30.0
}

fn default_motion_mode() -> String {
    "sim".to_string()
}

fn default_port() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_baud() -> u32 {
    9600
}

fn default_sample_timeout() -> u64 {
    60
}

fn default_clear_distance() -> f32 {
    400.0
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}
