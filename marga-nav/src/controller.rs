//! Route execution.
//!
//! The controller owns everything a run touches: the grid, the robot
//! state, the motor transport, the rangefinder array, and the RNG that
//! picks destinations. One instance, one robot, one run at a time.
//!
//! A run keeps planning and driving until the remaining route is just
//! the cell under the robot. Obstacles found along the way are marked on
//! the grid and routed around; every repair counts against a replan
//! budget so a boxed-in robot fails instead of looping forever.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use setu_io::{MotionTransport, MotorCommand, SensorArray, SensorMount};

use crate::calibration;
use crate::config::MargaConfig;
use crate::error::{MargaError, Result};
use crate::planning::{self, CellId, Command, GridMap};
use crate::robot::{MotionTiming, RobotState};
use crate::service::CancelToken;

/// Where the controller is in its run cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// No run active
    Idle,
    /// Choosing a destination and building a route
    Planning,
    /// Driving the planned route
    Executing,
    /// An obstacle was marked; a repair plan is next
    ObstacleDetected,
    /// The last run ended in an error
    Failed,
}

/// Summary of a finished move.
#[derive(Clone, Copy, Debug)]
pub struct MoveOutcome {
    /// Cell the run ended on
    pub destination: CellId,
    /// Replans consumed along the way
    pub replans: u32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SequenceOutcome {
    Completed,
    Obstacle,
}

enum StepOutcome {
    Advanced,
    Obstacle,
}

/// Drives one robot across one grid.
pub struct NavigationController {
    grid: GridMap,
    robot: RobotState,
    motion: Box<dyn MotionTransport>,
    sensors: SensorArray,
    config: MargaConfig,
    sample_timeout: Duration,
    state: RunState,
    rng: StdRng,
}

impl NavigationController {
    /// Build the controller, its grid, and the robot's starting state.
    pub fn new(
        config: MargaConfig,
        motion: Box<dyn MotionTransport>,
        sensors: SensorArray,
    ) -> Result<NavigationController> {
        let grid = GridMap::build(config.grid.length, config.grid.width, &config.grid.obstacles);
        let robot = RobotState::from_config(&config.robot);
        if !grid.is_routable(robot.position) {
            return Err(MargaError::InvalidDestination(robot.position));
        }
        let sample_timeout = Duration::from_millis(config.sensors.sample_timeout_ms);
        Ok(NavigationController {
            grid,
            robot,
            motion,
            sensors,
            config,
            sample_timeout,
            state: RunState::Idle,
            rng: StdRng::from_entropy(),
        })
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The grid as the controller currently knows it.
    pub fn grid(&self) -> &GridMap {
        &self.grid
    }

    /// Position, heading, and motion timing of the robot.
    pub fn robot(&self) -> &RobotState {
        &self.robot
    }

    /// Run the timing calibration and keep the result.
    pub fn calibrate(&mut self, cancel: &CancelToken) -> Result<MotionTiming> {
        let result = calibration::run(
            self.motion.as_mut(),
            &mut self.sensors,
            &mut self.robot,
            &self.config.calibration,
            self.sample_timeout,
            cancel,
        );
        match &result {
            Ok(_) => self.set_state(RunState::Idle),
            Err(MargaError::Cancelled) => {
                self.stop_quietly();
                self.set_state(RunState::Idle);
            }
            Err(e) => {
                tracing::error!("calibration failed: {}", e);
                self.stop_quietly();
                self.set_state(RunState::Failed);
            }
        }
        result
    }

    /// Drive to `destination`, or to a random routable cell when none is
    /// given.
    pub fn run_move(
        &mut self,
        destination: Option<CellId>,
        cancel: &CancelToken,
    ) -> Result<MoveOutcome> {
        let result = self.drive(destination, cancel);
        match &result {
            Ok(outcome) => {
                tracing::info!(
                    "run complete: cell {} ({} replans)",
                    outcome.destination,
                    outcome.replans
                );
                self.set_state(RunState::Idle);
            }
            Err(MargaError::Cancelled) => {
                tracing::info!("run cancelled at cell {}", self.robot.position);
                self.stop_quietly();
                self.set_state(RunState::Idle);
            }
            Err(e) => {
                tracing::error!("run failed: {}", e);
                self.stop_quietly();
                self.set_state(RunState::Failed);
            }
        }
        result
    }

    fn drive(&mut self, destination: Option<CellId>, cancel: &CancelToken) -> Result<MoveOutcome> {
        self.set_state(RunState::Planning);

        let goal = match destination {
            Some(cell) => {
                if !self.grid.is_routable(cell) {
                    return Err(MargaError::InvalidDestination(cell));
                }
                cell
            }
            None => self.pick_destination()?,
        };
        tracing::info!("moving from cell {} to cell {}", self.robot.position, goal);

        calibration::prepare_drivetrain(self.motion.as_mut())?;

        let mut route = planning::build_path(&self.grid, self.robot.position, goal)?;
        let mut replans = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(MargaError::Cancelled);
            }
            if route.len() < 2 {
                return Ok(MoveOutcome {
                    destination: self.robot.position,
                    replans,
                });
            }

            self.set_state(RunState::Executing);
            let commands = planning::translate(&route, self.robot.heading, self.grid.width());
            tracing::debug!(
                "driving route {:?} with {} commands",
                route.iter().map(|c| c.index()).collect::<Vec<_>>(),
                commands.len()
            );

            let outcome = self.execute(&commands, &mut route, cancel)?;
            if outcome == SequenceOutcome::Obstacle {
                self.set_state(RunState::ObstacleDetected);
            }
            // A sequence that ran dry without reaching the goal gets
            // replanned rather than replayed forever, against the same
            // budget as obstacle repairs.
            if outcome == SequenceOutcome::Obstacle || route.len() >= 2 {
                replans += 1;
                if replans > self.config.navigation.max_replans {
                    return Err(MargaError::ReplanLimitExceeded(
                        self.config.navigation.max_replans,
                    ));
                }
                self.set_state(RunState::Planning);
                route = planning::build_path(&self.grid, self.robot.position, goal)?;
            }
        }
    }

    /// Pick a random routable destination other than the current cell.
    fn pick_destination(&mut self) -> Result<CellId> {
        let position = self.robot.position;
        let candidates: Vec<CellId> = self
            .grid
            .routable_cells()
            .filter(|&cell| cell != position)
            .collect();
        if candidates.is_empty() {
            return Err(MargaError::InvalidDestination(position));
        }
        let goal = candidates[self.rng.gen_range(0..candidates.len())];
        tracing::debug!("picked destination cell {}", goal);
        Ok(goal)
    }

    fn execute(
        &mut self,
        commands: &[Command],
        route: &mut Vec<CellId>,
        cancel: &CancelToken,
    ) -> Result<SequenceOutcome> {
        for &command in commands {
            if cancel.is_cancelled() {
                return Err(MargaError::Cancelled);
            }
            match command {
                Command::Forward => {
                    if let StepOutcome::Obstacle = self.forward_step(route, cancel)? {
                        return Ok(SequenceOutcome::Obstacle);
                    }
                }
                Command::TurnRight => {
                    self.motion.send(MotorCommand::Right)?;
                    thread::sleep(self.robot.timing.quarter_turn_right());
                    self.motion.send(MotorCommand::Stop)?;
                    self.robot.heading = self.robot.heading.turn_right();
                }
                Command::TurnLeft => {
                    self.motion.send(MotorCommand::Left)?;
                    thread::sleep(self.robot.timing.quarter_turn_left());
                    self.motion.send(MotorCommand::Stop)?;
                    self.robot.heading = self.robot.heading.turn_left();
                }
            }
        }
        Ok(SequenceOutcome::Completed)
    }

    /// One forward cell: check ahead, drive in micro-steps watching the
    /// 60 degree rangefinders for drift, then advance the tracked state.
    fn forward_step(&mut self, route: &mut Vec<CellId>, cancel: &CancelToken) -> Result<StepOutcome> {
        let Some(&next) = route.get(1) else {
            // Stale sequence; nothing left to drive toward.
            return Ok(StepOutcome::Advanced);
        };

        let min_distance = self.config.navigation.min_distance_cm;
        let obstructed = self.sensors.sample(SensorMount::Forward, self.sample_timeout)?
            <= min_distance
            || self.sensors.sample(SensorMount::Left30, self.sample_timeout)? <= min_distance
            || self.sensors.sample(SensorMount::Right30, self.sample_timeout)? <= min_distance;

        if obstructed && self.grid.is_routable(next) {
            // No motor command between here and the repair plan.
            let blocked = self.grid.mark_obstacle(next, self.robot.heading);
            tracing::info!(
                "obstacle ahead of cell {}: blocked {:?}",
                self.robot.position,
                blocked.iter().map(|c| c.index()).collect::<Vec<_>>()
            );
            return Ok(StepOutcome::Obstacle);
        }

        self.motion.send(MotorCommand::Forward)?;

        let subdivisions = self.config.navigation.forward_subdivisions;
        let micro = Duration::from_secs_f32(self.robot.timing.forward_secs / subdivisions as f32);
        for _ in 0..subdivisions {
            if cancel.is_cancelled() {
                return Err(MargaError::Cancelled);
            }
            self.steer_clear()?;
            thread::sleep(micro);
        }

        self.motion.send(MotorCommand::Stop)?;
        route.remove(0);
        self.robot.position = next;
        tracing::debug!("advanced to cell {}", next);
        Ok(StepOutcome::Advanced)
    }

    /// Nudge away from whichever side wall has crept too close, without
    /// touching the planned route or the tracked heading.
    fn steer_clear(&mut self) -> Result<()> {
        let limit = self.config.navigation.min_distance_cm / 2.0;
        if self.sensors.sample(SensorMount::Left60, self.sample_timeout)? < limit {
            self.motion.send(MotorCommand::Right)?;
            thread::sleep(Duration::from_secs_f32(self.robot.timing.turn_right_secs / 2.0));
            self.motion.send(MotorCommand::Forward)?;
        }
        if self.sensors.sample(SensorMount::Right60, self.sample_timeout)? < limit {
            self.motion.send(MotorCommand::Left)?;
            thread::sleep(Duration::from_secs_f32(self.robot.timing.turn_left_secs / 2.0));
            self.motion.send(MotorCommand::Forward)?;
        }
        Ok(())
    }

    /// Best-effort halt on abort paths, where the causing error matters
    /// more than a failed stop.
    fn stop_quietly(&mut self) {
        if let Err(e) = self.motion.send(MotorCommand::Stop) {
            tracing::warn!("could not stop motors: {}", e);
        }
    }

    fn set_state(&mut self, state: RunState) {
        if self.state != state {
            tracing::debug!("state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setu_io::mock::{MockMotion, SensorRig};

    fn small_config() -> MargaConfig {
        let mut config = MargaConfig::default();
        // 4x4 frame leaves a 2x2 interior: cells 5, 6, 9, 10.
        config.grid.length = 4;
        config.grid.width = 4;
        config.robot.start_cell = 5;
        config.robot.forward_secs = 0.002;
        config.robot.turn_right_secs = 0.001;
        config.robot.turn_left_secs = 0.001;
        config.navigation.forward_subdivisions = 2;
        config
    }

    #[test]
    fn random_destination_skips_the_current_cell() {
        let rig = SensorRig::new(400.0);
        let mut controller =
            NavigationController::new(small_config(), Box::new(MockMotion::new()), rig.array())
                .unwrap();
        for _ in 0..50 {
            let destination = controller.pick_destination().unwrap();
            assert_ne!(destination, CellId(5));
            assert!(controller.grid().is_routable(destination));
        }
    }

    #[test]
    fn start_cell_must_be_routable() {
        let mut config = small_config();
        config.grid.obstacles = vec![5];
        let rig = SensorRig::new(400.0);
        let result =
            NavigationController::new(config, Box::new(MockMotion::new()), rig.array());
        assert!(matches!(
            result,
            Err(MargaError::InvalidDestination(CellId(5)))
        ));
    }

    #[test]
    fn controller_starts_idle() {
        let rig = SensorRig::new(400.0);
        let controller =
            NavigationController::new(small_config(), Box::new(MockMotion::new()), rig.array())
                .unwrap();
        assert_eq!(controller.state(), RunState::Idle);
        assert_eq!(controller.robot().position, CellId(5));
    }
}
