//! Line of sight and cover
//!
//! Sight lines are rasterized with Bresenham's algorithm. Only the tiles
//! strictly between the two endpoints are inspected.

use super::{Grid, GridPosition, Terrain};

/// AC bonus for half cover
pub const HALF_COVER_BONUS: i32 = 2;

/// Every tile on the line from `start` to `end`, both endpoints included
pub fn bresenham_line(start: GridPosition, end: GridPosition) -> Vec<GridPosition> {
    let dx = (end.x - start.x).abs();
    let dy = (end.y - start.y).abs();
    let sx = if start.x < end.x { 1 } else { -1 };
    let sy = if start.y < end.y { 1 } else { -1 };
    let mut err = dx - dy;

    let (mut x, mut y) = (start.x, start.y);
    let mut points = Vec::with_capacity((dx.max(dy) + 1) as usize);
    loop {
        points.push(GridPosition::new(x, y));
        if x == end.x && y == end.y {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
    points
}

impl Grid {
    fn between(&self, from: GridPosition, to: GridPosition) -> Vec<GridPosition> {
        let line = bresenham_line(from, to);
        if line.len() <= 2 {
            return Vec::new();
        }
        line[1..line.len() - 1].to_vec()
    }

    fn elevation_at(&self, pos: GridPosition) -> u8 {
        self.tile(pos).map_or(0, |t| t.elevation)
    }

    /// Whether nothing between `from` and `to` blocks sight.
    ///
    /// Blocking terrain always obstructs. A tile raised above both
    /// endpoints obstructs as well.
    pub fn line_of_sight(&self, from: GridPosition, to: GridPosition) -> bool {
        if from == to {
            return true;
        }
        let eye_level = self.elevation_at(from).max(self.elevation_at(to));
        self.between(from, to).into_iter().all(|pos| match self.tile(pos) {
            Some(tile) => !tile.terrain.blocks_sight() && tile.elevation <= eye_level,
            None => true,
        })
    }

    /// Full cover anywhere on the line makes the target untargetable
    pub fn has_full_cover(&self, attacker: GridPosition, target: GridPosition) -> bool {
        self.between(attacker, target)
            .into_iter()
            .filter_map(|pos| self.tile(pos))
            .any(|tile| tile.terrain == Terrain::FullCover)
    }

    /// AC bonus the target gets against this attacker.
    ///
    /// An explicit bonus on the target's own tile wins. Otherwise partial
    /// cover on the line grants its bonus (half cover unless set).
    pub fn cover_bonus(&self, attacker: GridPosition, target: GridPosition) -> i32 {
        if attacker == target {
            return 0;
        }
        if let Some(bonus) = self.tile(target).and_then(|t| t.cover_bonus) {
            return bonus;
        }
        self.between(attacker, target)
            .into_iter()
            .filter_map(|pos| self.tile(pos))
            .filter(|tile| tile.terrain == Terrain::PartialCover)
            .map(|tile| tile.cover_bonus.unwrap_or(HALF_COVER_BONUS))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, y: i32) -> GridPosition {
        GridPosition::new(x, y)
    }

    #[test]
    fn test_bresenham_endpoints() {
        let line = bresenham_line(pos(0, 0), pos(4, 2));
        assert_eq!(line.first(), Some(&pos(0, 0)));
        assert_eq!(line.last(), Some(&pos(4, 2)));
        assert_eq!(line.len(), 5);

        assert_eq!(bresenham_line(pos(3, 3), pos(3, 3)), vec![pos(3, 3)]);
        assert_eq!(bresenham_line(pos(2, 0), pos(0, 0)), vec![pos(2, 0), pos(1, 0), pos(0, 0)]);
    }

    #[test]
    fn test_line_of_sight_open() {
        let grid = Grid::new(10, 10).unwrap();
        assert!(grid.line_of_sight(pos(0, 0), pos(9, 9)));
    }

    #[test]
    fn test_blocking_tile_breaks_sight() {
        let mut grid = Grid::new(10, 10).unwrap();
        grid.set_terrain(pos(3, 0), Terrain::Blocking, None).unwrap();
        assert!(!grid.line_of_sight(pos(0, 0), pos(6, 0)));
        assert!(!grid.line_of_sight(pos(6, 0), pos(0, 0)));
        // endpoints themselves never block
        assert!(grid.line_of_sight(pos(0, 0), pos(3, 0)));
        assert!(grid.line_of_sight(pos(0, 1), pos(6, 1)));
    }

    #[test]
    fn test_elevation_tie_break() {
        let mut grid = Grid::new(10, 10).unwrap();
        grid.set_terrain(pos(2, 0), Terrain::Elevated, None).unwrap();
        assert!(!grid.line_of_sight(pos(0, 0), pos(4, 0)));

        // standing on equally high ground sees over it
        grid.set_terrain(pos(0, 0), Terrain::Elevated, None).unwrap();
        assert!(grid.line_of_sight(pos(0, 0), pos(4, 0)));
    }

    #[test]
    fn test_cover_bonus() {
        let mut grid = Grid::new(10, 10).unwrap();
        assert_eq!(grid.cover_bonus(pos(0, 0), pos(5, 0)), 0);

        grid.set_terrain(pos(2, 0), Terrain::PartialCover, None).unwrap();
        assert_eq!(grid.cover_bonus(pos(0, 0), pos(5, 0)), HALF_COVER_BONUS);

        grid.set_terrain(pos(5, 0), Terrain::Open, Some(5)).unwrap();
        assert_eq!(grid.cover_bonus(pos(0, 0), pos(5, 0)), 5);
    }

    #[test]
    fn test_full_cover() {
        let mut grid = Grid::new(10, 10).unwrap();
        grid.set_terrain(pos(2, 2), Terrain::FullCover, None).unwrap();
        assert!(grid.has_full_cover(pos(0, 0), pos(4, 4)));
        assert!(!grid.has_full_cover(pos(0, 0), pos(4, 0)));
        assert!(grid.line_of_sight(pos(0, 0), pos(4, 4)));
    }
}
