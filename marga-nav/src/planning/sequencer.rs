//! Route-to-command translation.
//!
//! A planned route is a list of adjacent cells; the drive firmware wants
//! turns and forward pulses. Each step turns the minimal amount on the
//! heading cycle (a reversal is two clockwise turns) and then drives one
//! cell forward.

use crate::heading::Heading;

use super::grid::CellId;

/// One logical drive instruction: a quarter turn or a one-cell move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Drive one cell along the current heading
    Forward,
    /// Rotate 90 degrees counter-clockwise
    TurnLeft,
    /// Rotate 90 degrees clockwise
    TurnRight,
}

/// Translate a route into drive commands, starting from `heading`.
///
/// Consecutive route cells must be lattice neighbors; a malformed pair
/// is skipped with a warning rather than emitting commands for it.
pub fn translate(route: &[CellId], heading: Heading, width: usize) -> Vec<Command> {
    let mut commands = Vec::new();
    let mut facing = heading;

    for pair in route.windows(2) {
        let Some(step) = Heading::of_step(pair[0], pair[1], width) else {
            tracing::warn!("route cells {} and {} are not adjacent", pair[0], pair[1]);
            continue;
        };
        commands.extend_from_slice(turns_between(facing, step));
        commands.push(Command::Forward);
        facing = step;
    }

    commands
}

/// Minimal turn run from one heading to another: nothing, one turn, or
/// two clockwise turns for a reversal.
fn turns_between(from: Heading, to: Heading) -> &'static [Command] {
    match (4 + to.cycle_index() - from.cycle_index()) % 4 {
        0 => &[],
        1 => &[Command::TurnRight],
        2 => &[Command::TurnRight, Command::TurnRight],
        _ => &[Command::TurnLeft],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[usize]) -> Vec<CellId> {
        raw.iter().map(|&i| CellId(i)).collect()
    }

    #[test]
    fn straight_route_needs_no_turns() {
        let commands = translate(&ids(&[19, 20, 21, 22]), Heading::East, 15);
        assert_eq!(commands, vec![Command::Forward; 3]);
    }

    #[test]
    fn single_turns_cover_the_cycle() {
        let width = 15;
        // East to south is one clockwise turn.
        assert_eq!(
            translate(&ids(&[19, 34]), Heading::East, width),
            vec![Command::TurnRight, Command::Forward]
        );
        // East to north is one counter-clockwise turn.
        assert_eq!(
            translate(&ids(&[34, 19]), Heading::East, width),
            vec![Command::TurnLeft, Command::Forward]
        );
        // South to west.
        assert_eq!(
            translate(&ids(&[20, 19]), Heading::South, width),
            vec![Command::TurnRight, Command::Forward]
        );
        // South to east.
        assert_eq!(
            translate(&ids(&[19, 20]), Heading::South, width),
            vec![Command::TurnLeft, Command::Forward]
        );
    }

    #[test]
    fn reversal_is_two_clockwise_turns() {
        let commands = translate(&ids(&[19, 20, 19]), Heading::East, 15);
        assert_eq!(
            commands,
            vec![
                Command::Forward,
                Command::TurnRight,
                Command::TurnRight,
                Command::Forward,
            ]
        );
    }

    #[test]
    fn heading_carries_across_steps() {
        // Staircase east and south, starting from north.
        let commands = translate(&ids(&[16, 17, 32, 33, 48]), Heading::North, 15);
        assert_eq!(
            commands,
            vec![
                Command::TurnRight,
                Command::Forward,
                Command::TurnRight,
                Command::Forward,
                Command::TurnLeft,
                Command::Forward,
                Command::TurnRight,
                Command::Forward,
            ]
        );
    }

    #[test]
    fn malformed_pairs_are_skipped() {
        let commands = translate(&ids(&[19, 21]), Heading::East, 15);
        assert!(commands.is_empty());
    }

    #[test]
    fn short_routes_produce_no_commands() {
        assert!(translate(&ids(&[19]), Heading::East, 15).is_empty());
        assert!(translate(&[], Heading::East, 15).is_empty());
    }
}
