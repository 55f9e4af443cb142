//! Budgeted pathfinding
//!
//! Breadth-first search over the eight neighbors of each tile. A tile is
//! queued again whenever it is reached more cheaply, so every tile that is
//! reachable within the budget is found at its cheapest cost.

use std::collections::{HashMap, VecDeque};

use super::{Grid, GridPosition};

/// Cheapest known cost to each explored tile and the tile it was reached from
struct Exploration {
    cost: HashMap<GridPosition, u32>,
    came_from: HashMap<GridPosition, GridPosition>,
}

fn reconstruct_path(
    came_from: &HashMap<GridPosition, GridPosition>,
    mut current: GridPosition,
) -> Vec<GridPosition> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

impl Grid {
    fn explore(&self, start: GridPosition, budget: u32, goal: Option<GridPosition>) -> Exploration {
        let mut cost = HashMap::from([(start, 0u32)]);
        let mut came_from = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            // The goal may be occupied, so never path through it
            if Some(current) == goal {
                continue;
            }
            let spent = cost[&current];

            for next in current.neighbors() {
                if !self.is_valid_position(next) {
                    continue;
                }
                if Some(next) != goal && self.is_occupied(next) {
                    continue;
                }
                let Some(step) = self.movement_cost(current, next) else {
                    continue;
                };
                let total = spent + step;
                if total > budget {
                    continue;
                }
                if cost.get(&next).map_or(true, |&known| total < known) {
                    cost.insert(next, total);
                    came_from.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        Exploration { cost, came_from }
    }

    /// Cheapest path from `start` to `end` costing at most `budget` feet.
    ///
    /// The result runs `start..=end`; it is empty when `end` cannot be
    /// reached. Intermediate tiles must be passable and unoccupied.
    pub fn find_path(
        &self,
        start: GridPosition,
        end: GridPosition,
        budget: u32,
    ) -> Vec<GridPosition> {
        if start == end {
            return vec![start];
        }
        if !self.is_valid_position(end) {
            return Vec::new();
        }
        let explored = self.explore(start, budget, Some(end));
        if !explored.cost.contains_key(&end) {
            return Vec::new();
        }
        reconstruct_path(&explored.came_from, end)
    }

    /// Feet spent walking a path. `None` if any step is illegal.
    pub fn path_cost(&self, path: &[GridPosition]) -> Option<u32> {
        path.windows(2).try_fold(0u32, |total, step| {
            if step[0].chebyshev(&step[1]) != 1 {
                return None;
            }
            Some(total + self.movement_cost(step[0], step[1])?)
        })
    }

    /// Unoccupied tiles a placed combatant can reach within `budget` feet
    pub fn reachable_positions(&self, id: &str, budget: u32) -> Vec<GridPosition> {
        let Some(start) = self.position_of(id) else {
            return Vec::new();
        };
        let mut reachable: Vec<GridPosition> = self
            .explore(start, budget, None)
            .cost
            .into_keys()
            .filter(|&pos| pos != start)
            .collect();
        reachable.sort();
        reachable
    }
}
