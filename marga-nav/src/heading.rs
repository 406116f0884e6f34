//! Robot heading on the grid.
//!
//! Four compass directions cycling N, E, S, W under clockwise turns. The
//! sequencer uses the cycle to pick minimal turn runs at plan time; the
//! controller advances the live heading as each turn completes.

use serde::Deserialize;

use crate::planning::CellId;

/// Direction the robot faces, aligned to the grid axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum Heading {
    /// Toward row 0 (cell id decreasing by one row width)
    #[serde(rename = "N")]
    North,
    /// Toward higher columns (cell id + 1)
    #[serde(rename = "E")]
    East,
    /// Toward higher rows (cell id + width)
    #[serde(rename = "S")]
    South,
    /// Toward lower columns (cell id - 1)
    #[serde(rename = "W")]
    West,
}

impl Heading {
    /// Heading after one 90 degree counter-clockwise turn.
    pub fn turn_left(self) -> Heading {
        match self {
            Heading::North => Heading::West,
            Heading::West => Heading::South,
            Heading::South => Heading::East,
            Heading::East => Heading::North,
        }
    }

    /// Heading after one 90 degree clockwise turn.
    pub fn turn_right(self) -> Heading {
        match self {
            Heading::North => Heading::East,
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
        }
    }

    /// Cell id delta of one step along this heading.
    pub fn offset(self, width: usize) -> isize {
        match self {
            Heading::North => -(width as isize),
            Heading::East => 1,
            Heading::South => width as isize,
            Heading::West => -1,
        }
    }

    /// Direction of the step between two cells, if they are lattice
    /// neighbors.
    pub fn of_step(from: CellId, to: CellId, width: usize) -> Option<Heading> {
        let delta = to.index() as isize - from.index() as isize;
        if delta == 1 {
            Some(Heading::East)
        } else if delta == -1 {
            Some(Heading::West)
        } else if delta == width as isize {
            Some(Heading::South)
        } else if delta == -(width as isize) {
            Some(Heading::North)
        } else {
            None
        }
    }

    /// Position on the clockwise N, E, S, W cycle.
    pub(crate) fn cycle_index(self) -> u8 {
        match self {
            Heading::North => 0,
            Heading::East => 1,
            Heading::South => 2,
            Heading::West => 3,
        }
    }
}

impl std::fmt::Display for Heading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            Heading::North => "N",
            Heading::East => "E",
            Heading::South => "S",
            Heading::West => "W",
        };
        f.write_str(letter)
    }
}
