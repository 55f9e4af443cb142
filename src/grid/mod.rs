//! Tactical grid: terrain, occupancy and distance
//!
//! - Square grid of 5-foot tiles, `(0, 0)` at the top left
//! - One combatant per tile, tracked in both directions
//! - One distance metric per grid, chosen at construction
//!
//! Line of sight and cover live in [`los`], pathfinding in [`path`].

pub mod los;
pub mod path;

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Feet per grid square
pub const SQUARE_FEET: u32 = 5;

/// Largest accepted width or height, in squares
pub const MAX_DIMENSION: i32 = 1000;

/// Integer grid coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The eight surrounding positions (not bounds-checked)
    pub fn neighbors(self) -> impl Iterator<Item = GridPosition> {
        (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| GridPosition::new(self.x + dx, self.y + dy))
    }

    /// Squares between two positions with diagonals counting as one
    pub fn chebyshev(&self, other: &GridPosition) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Open,
    /// Double movement cost
    Difficult,
    /// Impassable, blocks line of sight
    Blocking,
    /// Half cover for anyone behind it
    PartialCover,
    /// Passable, but nothing can be targeted through it
    FullCover,
    /// Double movement cost
    Water,
    /// Impassable
    Pit,
    /// Raised ground
    Elevated,
}

impl Terrain {
    pub fn is_passable(&self) -> bool {
        !matches!(self, Terrain::Blocking | Terrain::Pit)
    }

    pub fn blocks_sight(&self) -> bool {
        matches!(self, Terrain::Blocking)
    }

    /// Movement cost multiplier for entering a tile of this terrain
    pub fn movement_multiplier(&self) -> u32 {
        match self {
            Terrain::Difficult | Terrain::Water => 2,
            _ => 1,
        }
    }

    /// Elevation a freshly placed tile of this terrain gets
    pub fn default_elevation(&self) -> u8 {
        match self {
            Terrain::Elevated => 1,
            _ => 0,
        }
    }
}

impl FromStr for Terrain {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "open" => Ok(Terrain::Open),
            "difficult" => Ok(Terrain::Difficult),
            "blocking" | "wall" => Ok(Terrain::Blocking),
            "partial_cover" => Ok(Terrain::PartialCover),
            "full_cover" => Ok(Terrain::FullCover),
            "water" => Ok(Terrain::Water),
            "pit" => Ok(Terrain::Pit),
            "elevated" => Ok(Terrain::Elevated),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Terrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Terrain::Open => "open",
            Terrain::Difficult => "difficult",
            Terrain::Blocking => "blocking",
            Terrain::PartialCover => "partial_cover",
            Terrain::FullCover => "full_cover",
            Terrain::Water => "water",
            Terrain::Pit => "pit",
            Terrain::Elevated => "elevated",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    /// AC bonus granted to a combatant standing here
    pub cover_bonus: Option<i32>,
    pub elevation: u8,
}

/// How distances in feet are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Diagonals cost the same as orthogonal steps
    #[default]
    Chebyshev,
    Manhattan,
    Euclidean,
}

impl DistanceMetric {
    /// Distance in feet between two positions
    pub fn feet(&self, a: GridPosition, b: GridPosition) -> u32 {
        let dx = a.x.abs_diff(b.x);
        let dy = a.y.abs_diff(b.y);
        match self {
            DistanceMetric::Chebyshev => dx.max(dy) * SQUARE_FEET,
            DistanceMetric::Manhattan => (dx + dy) * SQUARE_FEET,
            DistanceMetric::Euclidean => {
                let squares = (dx as f64).hypot(dy as f64);
                (squares * SQUARE_FEET as f64).round() as u32
            }
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chebyshev" | "5e" => Ok(DistanceMetric::Chebyshev),
            "manhattan" => Ok(DistanceMetric::Manhattan),
            "euclidean" => Ok(DistanceMetric::Euclidean),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid dimensions must be between 1 and {} (got {width}x{height})", MAX_DIMENSION)]
    InvalidDimensions { width: i32, height: i32 },

    #[error("position {0} is outside the grid")]
    OutOfBounds(GridPosition),

    #[error("position {0} is impassable")]
    Impassable(GridPosition),

    #[error("position {position} is occupied by {occupant}")]
    Occupied { position: GridPosition, occupant: String },

    #[error("combatant {0} is not on the grid")]
    NotPlaced(String),
}

/// The battlefield
#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    metric: DistanceMetric,
    tiles: Vec<Tile>,
    positions: HashMap<String, GridPosition>,
    occupants: HashMap<GridPosition, String>,
}

impl Grid {
    /// Create a grid of open terrain
    pub fn new(width: i32, height: i32) -> Result<Self, GridError> {
        Self::with_metric(width, height, DistanceMetric::default())
    }

    pub fn with_metric(width: i32, height: i32, metric: DistanceMetric) -> Result<Self, GridError> {
        if width <= 0 || height <= 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(GridError::InvalidDimensions { width, height });
        }
        let area = width
            .checked_mul(height)
            .ok_or(GridError::InvalidDimensions { width, height })?;
        Ok(Self {
            width,
            height,
            metric,
            tiles: vec![Tile::default(); area as usize],
            positions: HashMap::new(),
            occupants: HashMap::new(),
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn in_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: GridPosition) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    pub fn tile(&self, pos: GridPosition) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    pub fn set_terrain(
        &mut self,
        pos: GridPosition,
        terrain: Terrain,
        cover_bonus: Option<i32>,
    ) -> Result<(), GridError> {
        let index = self.index(pos).ok_or(GridError::OutOfBounds(pos))?;
        self.tiles[index] = Tile {
            terrain,
            cover_bonus,
            elevation: terrain.default_elevation(),
        };
        Ok(())
    }

    pub fn set_elevation(&mut self, pos: GridPosition, elevation: u8) -> Result<(), GridError> {
        let index = self.index(pos).ok_or(GridError::OutOfBounds(pos))?;
        self.tiles[index].elevation = elevation;
        Ok(())
    }

    /// Non-open tiles, row-major
    pub fn features(&self) -> Vec<(GridPosition, Tile)> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| **tile != Tile::default())
            .map(|(i, tile)| {
                let i = i as i32;
                (GridPosition::new(i % self.width, i / self.width), *tile)
            })
            .collect()
    }

    /// In bounds and passable terrain
    pub fn is_valid_position(&self, pos: GridPosition) -> bool {
        self.tile(pos).is_some_and(|tile| tile.terrain.is_passable())
    }

    pub fn occupant(&self, pos: GridPosition) -> Option<&str> {
        self.occupants.get(&pos).map(String::as_str)
    }

    pub fn is_occupied(&self, pos: GridPosition) -> bool {
        self.occupants.contains_key(&pos)
    }

    pub fn position_of(&self, id: &str) -> Option<GridPosition> {
        self.positions.get(id).copied()
    }

    pub fn positions(&self) -> impl Iterator<Item = (&str, GridPosition)> {
        self.positions.iter().map(|(id, pos)| (id.as_str(), *pos))
    }

    fn check_destination(&self, id: &str, pos: GridPosition) -> Result<(), GridError> {
        let tile = self.tile(pos).ok_or(GridError::OutOfBounds(pos))?;
        if !tile.terrain.is_passable() {
            return Err(GridError::Impassable(pos));
        }
        match self.occupant(pos) {
            Some(other) if other != id => Err(GridError::Occupied {
                position: pos,
                occupant: other.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Put a combatant on the board, replacing any earlier placement
    pub fn place_combatant(&mut self, id: &str, pos: GridPosition) -> Result<(), GridError> {
        self.check_destination(id, pos)?;
        if let Some(old) = self.positions.insert(id.to_string(), pos) {
            self.occupants.remove(&old);
        }
        self.occupants.insert(pos, id.to_string());
        Ok(())
    }

    /// Relocate an already placed combatant
    pub fn move_combatant(&mut self, id: &str, pos: GridPosition) -> Result<(), GridError> {
        if !self.positions.contains_key(id) {
            return Err(GridError::NotPlaced(id.to_string()));
        }
        self.place_combatant(id, pos)
    }

    pub fn remove_combatant(&mut self, id: &str) -> Option<GridPosition> {
        let pos = self.positions.remove(id)?;
        self.occupants.remove(&pos);
        Some(pos)
    }

    /// Distance in feet under this grid's metric
    pub fn distance(&self, a: GridPosition, b: GridPosition) -> u32 {
        self.metric.feet(a, b)
    }

    pub fn is_adjacent(&self, a: GridPosition, b: GridPosition) -> bool {
        a != b && self.distance(a, b) <= SQUARE_FEET
    }

    /// Feet spent moving straight from `from` to `to`.
    ///
    /// `None` when the destination is off the board or impassable.
    pub fn movement_cost(&self, from: GridPosition, to: GridPosition) -> Option<u32> {
        let tile = self.tile(to)?;
        if !tile.terrain.is_passable() {
            return None;
        }
        Some(from.chebyshev(&to) * SQUARE_FEET * tile.terrain.movement_multiplier())
    }

    /// In-bounds positions within `feet` of `center`, excluding `center`
    pub fn positions_within_range(&self, center: GridPosition, feet: u32) -> Vec<GridPosition> {
        let reach = (feet / SQUARE_FEET) as i32 + 1;
        let mut found = Vec::new();
        for y in (center.y - reach).max(0)..=(center.y + reach).min(self.height - 1) {
            for x in (center.x - reach).max(0)..=(center.x + reach).min(self.width - 1) {
                let pos = GridPosition::new(x, y);
                if pos != center && self.distance(center, pos) <= feet {
                    found.push(pos);
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, y: i32) -> GridPosition {
        GridPosition::new(x, y)
    }

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(20, 15).unwrap();
        assert_eq!(grid.width(), 20);
        assert_eq!(grid.height(), 15);
        assert_eq!(grid.tile(pos(19, 14)).map(|t| t.terrain), Some(Terrain::Open));
        assert!(grid.tile(pos(20, 0)).is_none());
        assert!(grid.tile(pos(-1, 0)).is_none());
        assert_eq!(
            Grid::new(0, 5).unwrap_err(),
            GridError::InvalidDimensions { width: 0, height: 5 }
        );
    }

    #[test]
    fn test_dimension_cap() {
        assert_eq!(
            Grid::new(100_000, 100_000).unwrap_err(),
            GridError::InvalidDimensions { width: 100_000, height: 100_000 }
        );
        assert!(Grid::new(MAX_DIMENSION + 1, 1).is_err());
        let grid = Grid::new(MAX_DIMENSION, MAX_DIMENSION).unwrap();
        assert!(grid.in_bounds(pos(MAX_DIMENSION - 1, MAX_DIMENSION - 1)));
    }

    #[test]
    fn test_impassable_terrain() {
        let mut grid = Grid::new(5, 5).unwrap();
        grid.set_terrain(pos(1, 1), Terrain::Blocking, None).unwrap();
        grid.set_terrain(pos(2, 2), Terrain::Pit, None).unwrap();
        grid.set_terrain(pos(3, 3), Terrain::Water, None).unwrap();
        assert!(!grid.is_valid_position(pos(1, 1)));
        assert!(!grid.is_valid_position(pos(2, 2)));
        assert!(grid.is_valid_position(pos(3, 3)));
        assert_eq!(
            grid.place_combatant("a", pos(1, 1)),
            Err(GridError::Impassable(pos(1, 1)))
        );
    }

    #[test]
    fn test_occupancy_stays_bijective() {
        let mut grid = Grid::new(5, 5).unwrap();
        grid.place_combatant("a", pos(0, 0)).unwrap();
        grid.place_combatant("b", pos(1, 0)).unwrap();

        let err = grid.move_combatant("a", pos(1, 0)).unwrap_err();
        assert!(matches!(err, GridError::Occupied { .. }));

        grid.move_combatant("a", pos(2, 2)).unwrap();
        assert_eq!(grid.occupant(pos(0, 0)), None);
        assert_eq!(grid.occupant(pos(2, 2)), Some("a"));
        assert_eq!(grid.position_of("a"), Some(pos(2, 2)));

        for (id, p) in grid.positions() {
            assert_eq!(grid.occupant(p), Some(id));
        }
        assert_eq!(grid.remove_combatant("b"), Some(pos(1, 0)));
        assert!(!grid.is_occupied(pos(1, 0)));
    }

    #[test]
    fn test_move_requires_placement() {
        let mut grid = Grid::new(5, 5).unwrap();
        assert_eq!(
            grid.move_combatant("ghost", pos(1, 1)),
            Err(GridError::NotPlaced("ghost".into()))
        );
    }

    #[test]
    fn test_distance_metrics() {
        let a = pos(0, 0);
        let b = pos(3, 4);
        assert_eq!(DistanceMetric::Chebyshev.feet(a, b), 20);
        assert_eq!(DistanceMetric::Manhattan.feet(a, b), 35);
        assert_eq!(DistanceMetric::Euclidean.feet(a, b), 25);
    }

    #[test]
    fn test_adjacency_includes_diagonals() {
        let grid = Grid::new(5, 5).unwrap();
        assert!(grid.is_adjacent(pos(1, 1), pos(2, 2)));
        assert!(!grid.is_adjacent(pos(1, 1), pos(3, 1)));
        assert!(!grid.is_adjacent(pos(1, 1), pos(1, 1)));
    }

    #[test]
    fn test_movement_cost() {
        let mut grid = Grid::new(10, 10).unwrap();
        grid.set_terrain(pos(2, 0), Terrain::Difficult, None).unwrap();
        grid.set_terrain(pos(3, 0), Terrain::Blocking, None).unwrap();
        assert_eq!(grid.movement_cost(pos(0, 0), pos(1, 1)), Some(5));
        assert_eq!(grid.movement_cost(pos(1, 0), pos(2, 0)), Some(10));
        assert_eq!(grid.movement_cost(pos(2, 0), pos(3, 0)), None);
        assert_eq!(grid.movement_cost(pos(0, 0), pos(-1, 0)), None);
    }

    #[test]
    fn test_positions_within_range() {
        let grid = Grid::new(10, 10).unwrap();
        let around = grid.positions_within_range(pos(5, 5), 5);
        assert_eq!(around.len(), 8);

        let corner = grid.positions_within_range(pos(0, 0), 10);
        assert_eq!(corner.len(), 8);
        assert!(corner.iter().all(|p| grid.in_bounds(*p)));
    }

    #[test]
    fn test_features_lists_changed_tiles() {
        let mut grid = Grid::new(4, 4).unwrap();
        grid.set_terrain(pos(3, 1), Terrain::Elevated, None).unwrap();
        let features = grid.features();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].0, pos(3, 1));
        assert_eq!(features[0].1.elevation, 1);
    }

    #[test]
    fn test_terrain_parsing() {
        assert_eq!("partial-cover".parse::<Terrain>(), Ok(Terrain::PartialCover));
        assert_eq!("Full Cover".parse::<Terrain>(), Ok(Terrain::FullCover));
        assert!("lava".parse::<Terrain>().is_err());
    }
}
