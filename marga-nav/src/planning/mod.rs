//! Route planning: the grid graph, the shortest-path search over it,
//! and the translation of routes into drive commands.

mod astar;
mod grid;
mod sequencer;

pub use astar::build_path;
pub use grid::{Cell, CellId, GridMap};
pub use sequencer::{Command, translate};
