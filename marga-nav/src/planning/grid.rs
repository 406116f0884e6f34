//! Obstacle-aware grid graph.
//!
//! The drivable surface is the interior of a `length x width` lattice;
//! the outermost ring is a frame the robot never enters. Cells are
//! identified by `row * width + col`. Surveyed obstacles grow by a
//! one-cell halo when the map is built, since an obstacle reported at a
//! cell also makes its direct neighbors unsafe to drive through.

use std::collections::HashSet;

use crate::heading::Heading;

/// Identifier of a grid cell: `row * width + col`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub usize);

impl CellId {
    /// Sentinel carried by blocked cells. A blocked cell keeps its slot
    /// in the map but is gone from every adjacency list.
    pub const BLOCKED: CellId = CellId(usize::MAX);

    /// Raw index value.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One drivable cell and its routable neighbors.
#[derive(Clone, Debug)]
pub struct Cell {
    id: CellId,
    neighbors: Vec<CellId>,
}

impl Cell {
    /// Cell id, or [`CellId::BLOCKED`] once the cell has been blocked.
    pub fn id(&self) -> CellId {
        self.id
    }

    /// Routable lattice neighbors, up to four.
    pub fn neighbors(&self) -> &[CellId] {
        &self.neighbors
    }
}

/// The grid graph. Built once at startup; afterwards cells can only be
/// blocked, never restored.
#[derive(Clone, Debug)]
pub struct GridMap {
    length: usize,
    width: usize,
    cells: Vec<Cell>,
}

impl GridMap {
    /// Build the graph for a `length x width` lattice with the given
    /// obstacle cells.
    ///
    /// Each obstacle is expanded by its four direct neighbors before any
    /// cell is instantiated, so a surveyed obstacle clears a safety halo
    /// around itself. Obstacle ids outside the interior are tolerated.
    pub fn build(length: usize, width: usize, obstacles: &[usize]) -> GridMap {
        let mut unsafe_ids: HashSet<usize> = HashSet::new();
        for &id in obstacles {
            unsafe_ids.insert(id);
            if let Some(west) = id.checked_sub(1) {
                unsafe_ids.insert(west);
            }
            if let Some(north) = id.checked_sub(width) {
                unsafe_ids.insert(north);
            }
            if let Some(east) = id.checked_add(1) {
                unsafe_ids.insert(east);
            }
            if let Some(south) = id.checked_add(width) {
                unsafe_ids.insert(south);
            }
        }

        // Interior cells only; the frame stays off the map.
        let mut routable: HashSet<usize> = HashSet::new();
        for row in 1..length.saturating_sub(1) {
            for col in 1..width.saturating_sub(1) {
                let id = row * width + col;
                if !unsafe_ids.contains(&id) {
                    routable.insert(id);
                }
            }
        }

        let interior = length.saturating_sub(2) * width.saturating_sub(2);
        let mut cells = Vec::with_capacity(interior);
        for row in 1..length.saturating_sub(1) {
            for col in 1..width.saturating_sub(1) {
                let id = row * width + col;
                if routable.contains(&id) {
                    let neighbors = [
                        id.checked_sub(1),
                        id.checked_add(1),
                        id.checked_sub(width),
                        id.checked_add(width),
                    ]
                    .into_iter()
                    .flatten()
                    .filter(|n| routable.contains(n))
                    .map(CellId)
                    .collect();
                    cells.push(Cell {
                        id: CellId(id),
                        neighbors,
                    });
                } else {
                    cells.push(Cell {
                        id: CellId::BLOCKED,
                        neighbors: Vec::new(),
                    });
                }
            }
        }

        GridMap {
            length,
            width,
            cells,
        }
    }

    /// Grid width in columns, frame included.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid length in rows, frame included.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Look up a routable cell.
    pub fn get(&self, id: CellId) -> Option<&Cell> {
        let slot = self.slot_of(id)?;
        let cell = &self.cells[slot];
        if cell.id == id { Some(cell) } else { None }
    }

    /// Whether the cell exists and has not been blocked.
    pub fn is_routable(&self, id: CellId) -> bool {
        self.get(id).is_some()
    }

    /// Routable neighbors of a cell; empty if the cell is blocked or off
    /// the map.
    pub fn neighbors(&self, id: CellId) -> &[CellId] {
        self.get(id).map(Cell::neighbors).unwrap_or(&[])
    }

    /// All currently routable cell ids, ascending.
    pub fn routable_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells
            .iter()
            .filter(|cell| cell.id != CellId::BLOCKED)
            .map(Cell::id)
    }

    /// Hop-count lower bound between two cells.
    pub fn manhattan(&self, a: CellId, b: CellId) -> u32 {
        let (row_a, col_a) = (a.index() / self.width, a.index() % self.width);
        let (row_b, col_b) = (b.index() / self.width, b.index() % self.width);
        (row_a.abs_diff(row_b) + col_a.abs_diff(col_b)) as u32
    }

    /// Block `target` plus the two cells flanking it across the travel
    /// axis, and scrub all three from their neighbors' adjacency lists.
    ///
    /// An obstacle sensed while travelling north or south can just as
    /// well sit a little east or west of the reported cell, so the
    /// flanking pair is taken perpendicular to the travel heading. Cells
    /// already blocked or off the map are skipped. Blocking is permanent.
    ///
    /// Returns the cells that were newly blocked.
    pub fn mark_obstacle(&mut self, target: CellId, travel: Heading) -> Vec<CellId> {
        let raw = target.index();
        let (first, second) = match travel {
            Heading::North | Heading::South => (raw.checked_sub(1), raw.checked_add(1)),
            Heading::East | Heading::West => (raw.checked_sub(self.width), raw.checked_add(self.width)),
        };

        let mut newly_blocked = Vec::new();
        for id in [Some(raw), first, second].into_iter().flatten().map(CellId) {
            if self.block_cell(id) {
                newly_blocked.push(id);
            }
        }
        newly_blocked
    }

    fn block_cell(&mut self, id: CellId) -> bool {
        let Some(slot) = self.slot_of(id) else {
            return false;
        };
        if self.cells[slot].id != id {
            return false;
        }

        let neighbors = std::mem::take(&mut self.cells[slot].neighbors);
        for neighbor in &neighbors {
            if let Some(neighbor_slot) = self.slot_of(*neighbor) {
                self.cells[neighbor_slot].neighbors.retain(|&n| n != id);
            }
        }
        self.cells[slot].id = CellId::BLOCKED;
        true
    }

    /// Storage slot of an interior cell id, regardless of blocking.
    fn slot_of(&self, id: CellId) -> Option<usize> {
        let raw = id.index();
        let row = raw / self.width;
        let col = raw % self.width;
        if row >= 1 && row + 1 < self.length && col >= 1 && col + 1 < self.width {
            Some((row - 1) * (self.width - 2) + (col - 1))
        } else {
            None
        }
    }
}
