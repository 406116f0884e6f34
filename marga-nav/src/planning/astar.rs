//! Shortest-path search over the grid graph.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::{MargaError, Result};

use super::grid::{CellId, GridMap};

/// Frontier entry, ordered so the `BinaryHeap` pops the lowest f-score
/// first with ties going to the lowest cell id. Route choice is fully
/// deterministic for a given map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SearchNode {
    f_score: u32,
    cell: CellId,
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lower f_score = higher priority)
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Plan the cheapest route from `start` to `goal`, both inclusive.
///
/// A* with unit edge costs and the Manhattan hop count as heuristic, so
/// the result is a shortest hop path. Fails with
/// [`MargaError::InvalidDestination`] when either endpoint is blocked or
/// off the map, and with [`MargaError::NoPathFound`] when the frontier
/// runs dry before the goal is reached.
pub fn build_path(grid: &GridMap, start: CellId, goal: CellId) -> Result<Vec<CellId>> {
    if !grid.is_routable(start) {
        return Err(MargaError::InvalidDestination(start));
    }
    if !grid.is_routable(goal) {
        return Err(MargaError::InvalidDestination(goal));
    }

    let mut open_set = BinaryHeap::new();
    let mut g_score: HashMap<CellId, u32> = HashMap::new();
    let mut came_from: HashMap<CellId, CellId> = HashMap::new();
    let mut closed_set: HashSet<CellId> = HashSet::new();

    g_score.insert(start, 0);
    open_set.push(SearchNode {
        f_score: grid.manhattan(start, goal),
        cell: start,
    });

    while let Some(node) = open_set.pop() {
        let current = node.cell;

        if current == goal {
            return Ok(reconstruct_path(&came_from, start, goal));
        }

        // Stale duplicate of an already expanded cell
        if !closed_set.insert(current) {
            continue;
        }

        let current_g = *g_score.get(&current).unwrap_or(&u32::MAX);

        for &neighbor in grid.neighbors(current) {
            if closed_set.contains(&neighbor) {
                continue;
            }

            let tentative_g = current_g.saturating_add(1);
            let existing_g = *g_score.get(&neighbor).unwrap_or(&u32::MAX);

            if tentative_g < existing_g {
                g_score.insert(neighbor, tentative_g);
                came_from.insert(neighbor, current);
                open_set.push(SearchNode {
                    f_score: tentative_g + grid.manhattan(neighbor, goal),
                    cell: neighbor,
                });
            }
        }
    }

    Err(MargaError::NoPathFound {
        start: start.index(),
        goal: goal.index(),
    })
}

/// Walk the predecessor links back from the goal.
fn reconstruct_path(came_from: &HashMap<CellId, CellId>, start: CellId, goal: CellId) -> Vec<CellId> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&previous) => {
                path.push(previous);
                current = previous;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
