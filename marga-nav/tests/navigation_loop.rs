//! Full navigation runs against mock hardware.

use std::time::Duration;

use marga_nav::config::MargaConfig;
use marga_nav::controller::{NavigationController, RunState};
use marga_nav::error::MargaError;
use marga_nav::heading::Heading;
use marga_nav::planning::CellId;
use marga_nav::service::{self, CancelToken, ControlReply, RequestError};
use setu_io::mock::{MockMotion, ScriptedRange, SensorRig};
use setu_io::{MotionTransport, MotorCommand, SensorArray};

/// Millisecond-scale timings so a full run takes tens of milliseconds.
fn fast_config() -> MargaConfig {
    let mut config = MargaConfig::default();
    config.robot.start_cell = 19;
    config.robot.start_heading = Heading::East;
    config.robot.forward_secs = 0.004;
    config.robot.turn_right_secs = 0.002;
    config.robot.turn_left_secs = 0.002;
    config.navigation.forward_subdivisions = 2;
    config
}

fn controller_with(config: MargaConfig) -> (NavigationController, MockMotion, SensorRig) {
    let motion = MockMotion::new();
    let rig = SensorRig::new(400.0);
    let controller =
        NavigationController::new(config, Box::new(motion.clone()), rig.array()).unwrap();
    (controller, motion, rig)
}

#[test]
fn clear_route_reaches_the_destination() {
    let (mut controller, motion, _rig) = controller_with(fast_config());
    let outcome = controller
        .run_move(Some(CellId(81)), &CancelToken::new())
        .unwrap();

    assert_eq!(outcome.destination, CellId(81));
    assert_eq!(outcome.replans, 0);
    assert_eq!(controller.robot().position, CellId(81));
    assert_eq!(controller.robot().heading, Heading::South);
    assert_eq!(controller.state(), RunState::Idle);

    let commands = motion.commands();
    // Slack pulse first.
    assert_eq!(
        &commands[..3],
        &[
            MotorCommand::Forward,
            MotorCommand::Backward,
            MotorCommand::Stop
        ]
    );
    // Six forward cells plus the pulse, one clockwise quarter turn, and
    // a stop to finish.
    let forwards = commands
        .iter()
        .filter(|&&c| c == MotorCommand::Forward)
        .count();
    assert_eq!(forwards, 1 + 6);
    let rights = commands
        .iter()
        .filter(|&&c| c == MotorCommand::Right)
        .count();
    assert_eq!(rights, 1);
    assert_eq!(commands.last(), Some(&MotorCommand::Stop));
}

#[test]
fn moving_to_the_current_cell_is_a_no_op() {
    let (mut controller, motion, _rig) = controller_with(fast_config());
    let outcome = controller
        .run_move(Some(CellId(19)), &CancelToken::new())
        .unwrap();

    assert_eq!(outcome.destination, CellId(19));
    assert_eq!(outcome.replans, 0);
    // Only the slack pulse touched the motors.
    assert_eq!(
        motion.commands(),
        vec![
            MotorCommand::Forward,
            MotorCommand::Backward,
            MotorCommand::Stop
        ]
    );
}

#[test]
fn requested_destination_must_be_routable() {
    let mut config = fast_config();
    config.grid.obstacles = vec![50];
    let (mut controller, _motion, _rig) = controller_with(config);

    // 35 sits in the build-time halo of 50.
    let err = controller
        .run_move(Some(CellId(35)), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, MargaError::InvalidDestination(CellId(35))));
    assert_eq!(controller.state(), RunState::Failed);

    let err = controller
        .run_move(Some(CellId(200)), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, MargaError::InvalidDestination(CellId(200))));
}

#[test]
fn random_destination_completes_on_a_clear_grid() {
    let (mut controller, _motion, _rig) = controller_with(fast_config());
    let outcome = controller.run_move(None, &CancelToken::new()).unwrap();

    assert_ne!(outcome.destination, CellId(19));
    assert_eq!(controller.robot().position, outcome.destination);
    assert!(controller.grid().is_routable(outcome.destination));
    assert_eq!(controller.state(), RunState::Idle);
}

#[test]
fn blocked_cell_is_marked_and_replanned_once() {
    let (mut controller, motion, rig) = controller_with(fast_config());
    // The first forward pre-check sees a box 10cm ahead; everything
    // after that is clear.
    rig.forward.push_reading(10.0);

    let outcome = controller
        .run_move(Some(CellId(21)), &CancelToken::new())
        .unwrap();
    assert_eq!(outcome.replans, 1);
    assert_eq!(outcome.destination, CellId(21));
    assert_eq!(controller.robot().position, CellId(21));

    // Heading east toward cell 20, the mark blocks 20 and its
    // north/south flanks; 5 is a frame cell, so only 35 joins it.
    assert!(!controller.grid().is_routable(CellId(20)));
    assert!(!controller.grid().is_routable(CellId(35)));
    assert!(controller.grid().is_routable(CellId(34)));

    // Between the slack pulse and the detour there is no motor traffic
    // at all: detection happens before FWD goes out, and the repaired
    // route starts with a turn.
    let commands = motion.commands();
    assert_eq!(
        &commands[..3],
        &[
            MotorCommand::Forward,
            MotorCommand::Backward,
            MotorCommand::Stop
        ]
    );
    assert_eq!(commands[3], MotorCommand::Right);
}

#[test]
fn relentless_obstacles_exhaust_the_replan_budget() {
    let mut config = fast_config();
    config.navigation.max_replans = 2;

    let motion = MockMotion::new();
    let clear = ScriptedRange::constant(400.0);
    // The forward rangefinder never clears, whichever way the route
    // bends.
    let sensors = SensorArray::new(
        Box::new(clear.clone()),
        Box::new(clear.clone()),
        Box::new(ScriptedRange::constant(5.0)),
        Box::new(clear.clone()),
        Box::new(clear),
    );
    let mut controller =
        NavigationController::new(config, Box::new(motion), sensors).unwrap();

    let err = controller
        .run_move(Some(CellId(81)), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, MargaError::ReplanLimitExceeded(2)));
    assert_eq!(controller.state(), RunState::Failed);
    // No forward step ever completed.
    assert_eq!(controller.robot().position, CellId(19));
}

#[test]
fn side_wall_provokes_a_corrective_nudge() {
    let (mut controller, motion, rig) = controller_with(fast_config());
    // The left 60 degree sensor sees a wall well under half the minimum
    // distance during the first micro-step.
    rig.left_60.push_reading(4.0);

    let outcome = controller
        .run_move(Some(CellId(21)), &CancelToken::new())
        .unwrap();
    assert_eq!(outcome.replans, 0);
    assert_eq!(controller.robot().position, CellId(21));
    // Nudges never change the tracked heading.
    assert_eq!(controller.robot().heading, Heading::East);

    // Somewhere inside a forward drive: spin right, resume forward.
    let commands = motion.commands();
    let nudge = [
        MotorCommand::Forward,
        MotorCommand::Right,
        MotorCommand::Forward,
    ];
    let nudged = commands.windows(3).any(|w| w == nudge.as_slice());
    assert!(nudged, "expected a right-nudge inside a forward drive: {:?}", commands);
}

/// Transport that fails after a fixed number of sends.
struct FlakyMotion {
    sent: usize,
    fail_after: usize,
}

impl MotionTransport for FlakyMotion {
    fn send(&mut self, _command: MotorCommand) -> setu_io::Result<()> {
        self.sent += 1;
        if self.sent > self.fail_after {
            Err(setu_io::Error::Timeout)
        } else {
            Ok(())
        }
    }
}

#[test]
fn transport_failure_fails_the_run_without_advancing() {
    let rig = SensorRig::new(400.0);
    let motion = FlakyMotion {
        sent: 0,
        fail_after: 4,
    };
    let mut controller =
        NavigationController::new(fast_config(), Box::new(motion), rig.array()).unwrap();

    let err = controller
        .run_move(Some(CellId(81)), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, MargaError::Transport(_)));
    assert_eq!(controller.state(), RunState::Failed);
    // The first forward never finished, so the tracked position held.
    assert_eq!(controller.robot().position, CellId(19));
}

#[test]
fn cancellation_stops_an_active_run() {
    let mut config = fast_config();
    config.robot.forward_secs = 0.05; // slow enough to cancel mid-flight
    let (controller, motion, _rig) = controller_with(config);

    let (handle, worker) = service::spawn(controller);
    let reply = handle.request_move(Some(CellId(81))).unwrap();
    // Wait for the run to actually start before cancelling.
    while motion.commands().is_empty() {
        std::thread::sleep(Duration::from_millis(1));
    }
    handle.cancel_active();

    match reply.recv().unwrap() {
        ControlReply::Failed(detail) => {
            assert!(detail.contains("cancelled"), "unexpected detail: {}", detail)
        }
        ControlReply::Completed(detail) => panic!("run should have been cancelled: {}", detail),
    }
    // The worker stopped the motors on the way out.
    assert_eq!(motion.commands().last(), Some(&MotorCommand::Stop));

    drop(handle);
    worker.join().unwrap();
}

#[test]
fn concurrent_requests_queue_once_then_reject() {
    let mut config = fast_config();
    config.robot.forward_secs = 0.05;
    let (controller, motion, _rig) = controller_with(config);
    let (handle, worker) = service::spawn(controller);

    let first = handle.request_move(Some(CellId(81))).unwrap();
    while motion.commands().is_empty() {
        std::thread::sleep(Duration::from_millis(1));
    }
    // The worker is busy driving; one more request fits in the queue...
    let second = handle.request_move(Some(CellId(19))).unwrap();
    // ...and the third is turned away.
    let third = handle.request_move(Some(CellId(19)));
    assert_eq!(third.unwrap_err(), RequestError::Busy);

    assert!(matches!(first.recv().unwrap(), ControlReply::Completed(_)));
    assert!(matches!(second.recv().unwrap(), ControlReply::Completed(_)));

    drop(handle);
    worker.join().unwrap();
}

#[test]
fn calibration_request_reports_the_derived_timing() {
    let mut config = fast_config();
    config.calibration.drive_secs = 0.01;
    config.calibration.spin_up_secs = 0.005;
    config.calibration.settle_secs = 0.0;
    config.calibration.poll_interval_ms = 1;
    config.calibration.max_wait_secs = 1.0;

    let motion = MockMotion::new();
    let rig = SensorRig::new(400.0);
    rig.forward.push_readings(&[100.0, 60.0]); // forward probe: 0.5s per cell
    rig.forward.push_readings(&[80.0, 81.0]); // right probe converges at once
    rig.forward.push_readings(&[90.0, 90.5]); // left probe too

    let controller =
        NavigationController::new(config, Box::new(motion), rig.array()).unwrap();
    let (handle, worker) = service::spawn(controller);

    match handle.request_calibration().unwrap().recv().unwrap() {
        ControlReply::Completed(detail) => {
            assert!(detail.contains("forward 0.5000s"), "{}", detail)
        }
        ControlReply::Failed(detail) => panic!("calibration failed: {}", detail),
    }

    drop(handle);
    worker.join().unwrap();
}
