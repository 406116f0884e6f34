//! MargaNav - Grid navigation controller for a small wheeled robot
//!
//! The robot lives on a fixed rectangular grid and runs its motors open
//! loop: the drive firmware understands five words (forward, backward,
//! spin either way, stop) and keeps doing the last one until told
//! otherwise. MargaNav turns that into cell-to-cell navigation:
//!
//! - a grid graph that absorbs surveyed and freshly discovered obstacles
//! - a deterministic shortest-path planner over it
//! - a sequencer that rewrites routes as turn and forward commands
//! - a calibration procedure that measures how long one cell and one
//!   turn increment actually take on the current surface
//! - a controller that executes routes while watching five forward
//!   rangefinders, repairing the route when something is in the way
//!
//! Hardware access goes through the capability traits in `setu-io`, so
//! everything here runs the same against mocks as against the robot.

pub mod calibration;
pub mod config;
pub mod controller;
pub mod error;
pub mod heading;
pub mod planning;
pub mod robot;
pub mod service;

// Re-export commonly used types
pub use config::MargaConfig;
pub use controller::{MoveOutcome, NavigationController, RunState};
pub use error::{MargaError, Result};
pub use heading::Heading;
pub use planning::{CellId, GridMap};
pub use service::{CancelToken, ControlReply, NavHandle};
