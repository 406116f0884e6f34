//! Motion timing calibration.
//!
//! The drive firmware runs the motors open loop, so the controller has
//! to learn how long "one cell" and "30 degrees" take on the surface the
//! robot actually sits on. The forward probe compares rangefinder
//! readings before and after a fixed drive. The turn probes spin until
//! the forward rangefinder sees its starting reading again, which
//! happens once per full rotation, and divide the lap time by the twelve
//! 30 degree increments in it.

use std::thread;
use std::time::{Duration, Instant};

use setu_io::{MotionTransport, MotorCommand, SensorArray, SensorMount};

use crate::config::CalibrationConfig;
use crate::error::{MargaError, Result};
use crate::robot::{MotionTiming, RobotState};
use crate::service::CancelToken;

/// Duration of the slack pickup pulses before a measurement run.
const SLACK_PULSE: Duration = Duration::from_millis(100);

/// Measure motion timing and store it in `robot`.
///
/// Leaves `robot.timing` untouched when any probe fails.
pub fn run(
    motion: &mut dyn MotionTransport,
    sensors: &mut SensorArray,
    robot: &mut RobotState,
    config: &CalibrationConfig,
    sample_timeout: Duration,
    cancel: &CancelToken,
) -> Result<MotionTiming> {
    let drive = Duration::from_secs_f32(config.drive_secs);
    let settle = Duration::from_secs_f32(config.settle_secs);

    prepare_drivetrain(motion)?;

    // Forward probe: how far does a fixed-length drive get us?
    let baseline = sensors.sample(SensorMount::Forward, sample_timeout)?;
    motion.send(MotorCommand::Forward)?;
    thread::sleep(drive);
    motion.send(MotorCommand::Stop)?;
    let after = sensors.sample(SensorMount::Forward, sample_timeout)?;

    let delta = (after - baseline).abs();
    let forward_secs = round4(config.reference_distance_cm / delta);
    if !forward_secs.is_finite() || forward_secs <= 0.0 {
        return Err(MargaError::CalibrationFailed(format!(
            "forward probe moved {:.1}cm, cannot derive a drive time",
            delta
        )));
    }
    tracing::info!(
        "forward probe: {:.1}cm in {:.1}s, {:.4}s per cell",
        delta,
        config.drive_secs,
        forward_secs
    );

    // Back to roughly where the probe started before spinning.
    motion.send(MotorCommand::Backward)?;
    thread::sleep(drive);
    motion.send(MotorCommand::Stop)?;
    thread::sleep(settle);

    let turn_right_secs =
        measure_turn(motion, sensors, MotorCommand::Right, config, sample_timeout, cancel)?;
    thread::sleep(settle);
    let turn_left_secs =
        measure_turn(motion, sensors, MotorCommand::Left, config, sample_timeout, cancel)?;

    let timing = MotionTiming {
        forward_secs,
        turn_right_secs,
        turn_left_secs,
    };
    robot.timing = timing;
    tracing::info!(
        "calibrated: forward {:.4}s, right {:.4}s, left {:.4}s",
        timing.forward_secs,
        timing.turn_right_secs,
        timing.turn_left_secs
    );
    Ok(timing)
}

/// Take up gear slack so the first measured motion starts crisply.
pub(crate) fn prepare_drivetrain(motion: &mut dyn MotionTransport) -> Result<()> {
    motion.send(MotorCommand::Forward)?;
    thread::sleep(SLACK_PULSE);
    motion.send(MotorCommand::Backward)?;
    thread::sleep(SLACK_PULSE);
    motion.send(MotorCommand::Stop)?;
    Ok(())
}

/// Time one full rotation by watching the forward rangefinder come back
/// to its baseline reading, then divide by the increments in a lap.
fn measure_turn(
    motion: &mut dyn MotionTransport,
    sensors: &mut SensorArray,
    direction: MotorCommand,
    config: &CalibrationConfig,
    sample_timeout: Duration,
    cancel: &CancelToken,
) -> Result<f32> {
    let baseline = sensors.sample(SensorMount::Forward, sample_timeout)?;
    let started = Instant::now();
    motion.send(direction)?;

    // Head start so the baseline has rotated out of view before the
    // convergence check begins.
    thread::sleep(Duration::from_secs_f32(config.spin_up_secs));

    let deadline = started + Duration::from_secs_f32(config.max_wait_secs);
    let poll = Duration::from_millis(config.poll_interval_ms);
    loop {
        if cancel.is_cancelled() {
            motion.send(MotorCommand::Stop)?;
            return Err(MargaError::Cancelled);
        }
        let reading = sensors.sample(SensorMount::Forward, sample_timeout)?;
        if (reading - baseline).abs() <= config.tolerance_cm {
            break;
        }
        if Instant::now() >= deadline {
            motion.send(MotorCommand::Stop)?;
            return Err(MargaError::CalibrationTimeout(config.max_wait_secs));
        }
        thread::sleep(poll);
    }

    let lap = started.elapsed().as_secs_f32();
    motion.send(MotorCommand::Stop)?;

    tracing::debug!("{} lap took {:.2}s", direction, lap);
    Ok(round4(lap / 12.0))
}

fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}
