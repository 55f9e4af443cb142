//! Combat sessions
//!
//! A session owns its roster, the fixed turn order, a lazily built grid,
//! the append-only action log and its own dice source. Turn advancement
//! lives in [`super::turn`], action resolution in [`super::resolver`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::action::{ActionRecord, ActionType};
use super::combatant::{
    ActionEconomy, CharacterClass, CharacterSnapshot, Combatant, DeathSaves,
};
use super::conditions::Condition;
use super::dice::{roll_d20, Advantage, RngSource, RollSource};
use super::error::{CombatError, CombatResult, NotFoundError, StateError};
use crate::grid::{DistanceMetric, Grid, GridError, GridPosition, Terrain, Tile, MAX_DIMENSION};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Roster being assembled, no turns yet
    #[default]
    Forming,
    Active,
    Ended,
}

/// A combatant joining a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantSpec {
    pub id: String,
    pub snapshot: CharacterSnapshot,
    /// Rolled as d20 + DEX when absent
    #[serde(default)]
    pub initiative: Option<i32>,
    /// Starting tile; default placement when absent
    #[serde(default)]
    pub position: Option<GridPosition>,
}

impl CombatantSpec {
    pub fn new(id: impl Into<String>, snapshot: CharacterSnapshot) -> Self {
        Self {
            id: id.into(),
            snapshot,
            initiative: None,
            position: None,
        }
    }

    pub fn with_initiative(mut self, initiative: i32) -> Self {
        self.initiative = Some(initiative);
        self
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.position = Some(GridPosition::new(x, y));
        self
    }
}

/// Terrain applied to a set of tiles when the grid is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainFeature {
    pub terrain: Terrain,
    pub positions: Vec<GridPosition>,
    #[serde(default)]
    pub cover_bonus: Option<i32>,
    #[serde(default)]
    pub elevation: Option<u8>,
}

/// Per-session construction options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSetup {
    pub grid_width: i32,
    pub grid_height: i32,
    pub distance_metric: DistanceMetric,
    pub terrain: Vec<TerrainFeature>,
    /// Seed for a reproducible dice stream
    pub seed: Option<u64>,
}

impl Default for SessionSetup {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 15,
            distance_metric: DistanceMetric::default(),
            terrain: Vec::new(),
            seed: None,
        }
    }
}

impl SessionSetup {
    /// Build the dice source this setup asks for
    pub fn roller(&self) -> Box<dyn RollSource> {
        match self.seed {
            Some(seed) => Box::new(RngSource(StdRng::seed_from_u64(seed))),
            None => Box::new(RngSource(StdRng::from_os_rng())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantView {
    pub id: String,
    pub name: String,
    pub class: CharacterClass,
    pub initiative: i32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub temp_hp: i32,
    pub armor_class: i32,
    pub conditions: Vec<Condition>,
    pub death_saves: DeathSaves,
    pub economy: ActionEconomy,
    pub position: Option<GridPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub phase: Phase,
    pub round: u32,
    pub turn_index: Option<usize>,
    pub current_combatant: Option<String>,
    pub order: Vec<String>,
    pub combatants: Vec<CombatantView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainCell {
    pub position: GridPosition,
    #[serde(flatten)]
    pub tile: Tile,
}

/// Snapshot of the battlefield
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialState {
    pub width: i32,
    pub height: i32,
    pub distance_metric: DistanceMetric,
    pub positions: BTreeMap<String, GridPosition>,
    pub terrain: Vec<TerrainCell>,
    pub roster: Vec<CombatantView>,
}

/// Result of an operation plus the record it appended
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    pub outcome: T,
    pub record: ActionRecord,
}

pub struct CombatSession {
    id: String,
    phase: Phase,
    round: u32,
    pub(crate) turn_index: Option<usize>,
    pub(crate) order: Vec<String>,
    pub(crate) combatants: Vec<Combatant>,
    setup: SessionSetup,
    start_positions: HashMap<String, GridPosition>,
    grid: Option<Grid>,
    log: Vec<ActionRecord>,
    roller: Box<dyn RollSource>,
}

impl std::fmt::Debug for CombatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatSession")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("round", &self.round)
            .field("turn_index", &self.turn_index)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl CombatSession {
    pub fn new(id: impl Into<String>, setup: SessionSetup) -> Self {
        let roller = setup.roller();
        Self::with_roller(id, setup, roller)
    }

    /// Session drawing dice from the given source
    pub fn with_roller(
        id: impl Into<String>,
        setup: SessionSetup,
        roller: Box<dyn RollSource>,
    ) -> Self {
        Self {
            id: id.into(),
            phase: Phase::Forming,
            round: 1,
            turn_index: None,
            order: Vec::new(),
            combatants: Vec::new(),
            setup,
            start_positions: HashMap::new(),
            grid: None,
            log: Vec::new(),
            roller,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub(crate) fn next_round(&mut self) {
        self.round += 1;
    }

    pub fn turn_index(&self) -> Option<usize> {
        self.turn_index
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn log(&self) -> &[ActionRecord] {
        &self.log
    }

    pub(crate) fn roller(&mut self) -> &mut dyn RollSource {
        self.roller.as_mut()
    }

    pub(crate) fn ensure_not_ended(&self) -> CombatResult<()> {
        if self.phase == Phase::Ended {
            return Err(StateError::SessionEnded.into());
        }
        Ok(())
    }

    pub(crate) fn ensure_active(&self) -> CombatResult<()> {
        match self.phase {
            Phase::Active => Ok(()),
            Phase::Ended => Err(StateError::SessionEnded.into()),
            Phase::Forming => Err(StateError::SessionNotActive.into()),
        }
    }

    pub(crate) fn index_of(&self, id: &str) -> CombatResult<usize> {
        self.combatants
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| NotFoundError::Combatant(id.to_string()).into())
    }

    pub fn combatant(&self, id: &str) -> CombatResult<&Combatant> {
        Ok(&self.combatants[self.index_of(id)?])
    }

    pub(crate) fn combatant_mut(&mut self, id: &str) -> CombatResult<&mut Combatant> {
        let index = self.index_of(id)?;
        Ok(&mut self.combatants[index])
    }

    /// The combatant whose turn it is
    pub fn current_combatant(&self) -> Option<&Combatant> {
        let id = self.order.get(self.turn_index?)?;
        self.combatants.iter().find(|c| &c.id == id)
    }

    pub(crate) fn ensure_turn(&self, id: &str) -> CombatResult<()> {
        match self.current_combatant() {
            Some(current) if current.id == id => Ok(()),
            _ => Err(StateError::NotYourTurn(id.to_string()).into()),
        }
    }

    /// Append a record to the log and hand back a copy
    pub(crate) fn push_record(&mut self, record: ActionRecord) -> ActionRecord {
        self.log.push(record.clone());
        record
    }

    pub(crate) fn record(&self, action_type: ActionType) -> ActionRecord {
        ActionRecord::new(&self.id, action_type, self.round)
    }

    /// Add a combatant to the roster.
    ///
    /// Once combat is running the newcomer joins the end of the turn order
    /// instead of being sorted in.
    pub fn add_combatant(&mut self, spec: CombatantSpec) -> CombatResult<Resolved<CombatantView>> {
        self.ensure_not_ended()?;
        if spec.id.is_empty() {
            return Err(CombatError::validation("combatant id must not be empty"));
        }
        if self.combatants.iter().any(|c| c.id == spec.id) {
            return Err(CombatError::validation(format!(
                "combatant {} already in session",
                spec.id
            )));
        }
        if spec.snapshot.max_hp <= 0 {
            return Err(CombatError::validation("max_hp must be positive"));
        }
        if let Some(pos) = spec.position {
            if !self.in_setup_bounds(pos) {
                return Err(CombatError::validation(format!(
                    "position {} is outside the grid",
                    pos
                )));
            }
        }

        let initiative = match spec.initiative {
            Some(value) => value,
            None => {
                let natural = roll_d20(self.roller.as_mut(), Advantage::Normal) as i32;
                natural.saturating_add(spec.snapshot.abilities.dexterity)
            }
        };
        let combatant = Combatant::new(spec.id.clone(), Arc::new(spec.snapshot), initiative);
        debug!(session = %self.id, combatant = %combatant.id, initiative, "combatant added");
        self.combatants.push(combatant);
        if let Some(pos) = spec.position {
            self.start_positions.insert(spec.id.clone(), pos);
        }

        if self.phase == Phase::Active {
            self.order.push(spec.id.clone());
            if self.turn_index.is_none() {
                self.turn_index = Some(0);
            }
        }
        if self.grid.is_some() {
            self.place_one(&spec.id);
        }

        let view = self.combatant_view(self.combatants.len() - 1);
        let record = self
            .record(ActionType::AddCombatant)
            .actor(&spec.id)
            .input(json!({ "initiative": spec.initiative, "position": spec.position }))
            .result(&view);
        Ok(Resolved {
            outcome: view,
            record: self.push_record(record),
        })
    }

    /// Fix the turn order and begin round 1
    pub fn start(&mut self) -> CombatResult<Resolved<SessionView>> {
        match self.phase {
            Phase::Forming => {}
            Phase::Active => return Err(StateError::AlreadyStarted.into()),
            Phase::Ended => return Err(StateError::SessionEnded.into()),
        }
        let (width, height) = (self.setup.grid_width, self.setup.grid_height);
        if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
            return Err(GridError::InvalidDimensions { width, height }.into());
        }

        // Stable sort keeps insertion order among equal initiatives
        let mut ranked: Vec<&Combatant> = self.combatants.iter().collect();
        ranked.sort_by(|a, b| b.initiative.cmp(&a.initiative));
        self.order = ranked.into_iter().map(|c| c.id.clone()).collect();

        self.phase = Phase::Active;
        self.round = 1;
        self.turn_index = if self.order.is_empty() { None } else { Some(0) };

        if !self.setup.terrain.is_empty() || !self.start_positions.is_empty() {
            self.ensure_grid()?;
        }

        info!(session = %self.id, combatants = self.order.len(), "combat started");
        let view = self.view();
        let record = self
            .record(ActionType::StartCombat)
            .input(json!({ "order": self.order }))
            .result(&view);
        Ok(Resolved {
            outcome: view,
            record: self.push_record(record),
        })
    }

    /// Take a combatant out of the roster, the order and the grid
    pub fn remove_combatant(&mut self, id: &str) -> CombatResult<Resolved<CombatantView>> {
        self.ensure_not_ended()?;
        let index = self.index_of(id)?;
        let view = self.combatant_view(index);
        self.combatants.remove(index);
        self.start_positions.remove(id);
        if let Some(grid) = self.grid.as_mut() {
            grid.remove_combatant(id);
        }
        if let Some(slot) = self.order.iter().position(|o| o == id) {
            self.order.remove(slot);
            self.reclamp_after_removal(slot);
        }

        debug!(session = %self.id, combatant = id, "combatant removed");
        let record = self.record(ActionType::RemoveCombatant).actor(id).result(&view);
        Ok(Resolved {
            outcome: view,
            record: self.push_record(record),
        })
    }

    /// Finish the encounter. The grid is dropped and every later mutation
    /// is rejected.
    pub fn end(&mut self) -> CombatResult<Resolved<SessionView>> {
        self.ensure_not_ended()?;
        self.phase = Phase::Ended;
        self.grid = None;
        info!(session = %self.id, round = self.round, "combat ended");
        let view = self.view();
        let record = self.record(ActionType::EndCombat).result(&view);
        Ok(Resolved {
            outcome: view,
            record: self.push_record(record),
        })
    }

    fn in_setup_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.setup.grid_width && pos.y < self.setup.grid_height
    }

    pub fn has_grid(&self) -> bool {
        self.grid.is_some()
    }

    /// The grid if it has been built
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    /// The grid, building it from the roster on first use
    pub fn ensure_grid(&mut self) -> CombatResult<&mut Grid> {
        self.ensure_not_ended()?;
        if self.grid.is_none() {
            let grid = self.build_grid()?;
            self.grid = Some(grid);
            let ids: Vec<String> = self.combatants.iter().map(|c| c.id.clone()).collect();
            // Explicit positions claim their tiles before anyone is defaulted
            let (explicit, defaulted): (Vec<String>, Vec<String>) =
                ids.into_iter().partition(|id| self.start_positions.contains_key(id));
            for id in explicit.iter().chain(defaulted.iter()) {
                self.place_one(id);
            }
            debug!(session = %self.id, "grid built");
        }
        self.grid
            .as_mut()
            .ok_or_else(|| CombatError::validation("grid unavailable"))
    }

    fn build_grid(&self) -> CombatResult<Grid> {
        let mut grid = Grid::with_metric(
            self.setup.grid_width,
            self.setup.grid_height,
            self.setup.distance_metric,
        )?;
        for feature in &self.setup.terrain {
            for &pos in &feature.positions {
                if !grid.in_bounds(pos) {
                    warn!(session = %self.id, %pos, "terrain outside grid ignored");
                    continue;
                }
                grid.set_terrain(pos, feature.terrain, feature.cover_bonus)?;
                if let Some(elevation) = feature.elevation {
                    grid.set_elevation(pos, elevation)?;
                }
            }
        }
        Ok(grid)
    }

    /// Place one combatant: its explicit start if that tile is free,
    /// otherwise the next default slot for its side.
    fn place_one(&mut self, id: &str) {
        let Ok(index) = self.index_of(id) else {
            return;
        };
        let is_monster = self.combatants[index].snapshot.is_monster();
        let explicit = self.start_positions.get(id).copied();
        let Some(grid) = self.grid.as_mut() else {
            return;
        };

        if let Some(pos) = explicit {
            match grid.place_combatant(id, pos) {
                Ok(()) => return,
                Err(err) => warn!(combatant = id, error = %err, "start position rejected"),
            }
        }
        match default_position(grid, is_monster) {
            Some(pos) => {
                if let Err(err) = grid.place_combatant(id, pos) {
                    warn!(combatant = id, error = %err, "default placement failed");
                }
            }
            None => warn!(combatant = id, "no free tile to place combatant"),
        }
    }

    pub(crate) fn combatant_view(&self, index: usize) -> CombatantView {
        let c = &self.combatants[index];
        CombatantView {
            id: c.id.clone(),
            name: c.name().to_string(),
            class: c.snapshot.class,
            initiative: c.initiative,
            current_hp: c.current_hp,
            max_hp: c.max_hp(),
            temp_hp: c.temp_hp,
            armor_class: c.snapshot.armor_class,
            conditions: c.conditions.iter().collect(),
            death_saves: c.death_saves,
            economy: c.economy,
            position: self.grid.as_ref().and_then(|g| g.position_of(&c.id)),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id.clone(),
            phase: self.phase,
            round: self.round,
            turn_index: self.turn_index,
            current_combatant: self.current_combatant().map(|c| c.id.clone()),
            order: self.order.clone(),
            combatants: (0..self.combatants.len()).map(|i| self.combatant_view(i)).collect(),
        }
    }

    /// Change one tile mid-combat. An occupied tile cannot be made
    /// impassable.
    pub fn set_terrain(
        &mut self,
        pos: GridPosition,
        terrain: Terrain,
        cover_bonus: Option<i32>,
    ) -> CombatResult<Tile> {
        let grid = self.ensure_grid()?;
        if !grid.in_bounds(pos) {
            return Err(CombatError::validation(format!("position {} is outside the grid", pos)));
        }
        if !terrain.is_passable() {
            if let Some(occupant) = grid.occupant(pos) {
                return Err(StateError::TileOccupied {
                    position: pos,
                    occupant: occupant.to_string(),
                }
                .into());
            }
        }
        grid.set_terrain(pos, terrain, cover_bonus)?;
        let tile = grid.tile(pos).copied().unwrap_or_default();
        debug!(session = %self.id, %pos, %terrain, "terrain changed");
        Ok(tile)
    }

    /// Grid dimensions, occupancy, terrain and roster
    pub fn spatial_state(&mut self) -> CombatResult<SpatialState> {
        let grid = self.ensure_grid()?;
        let width = grid.width();
        let height = grid.height();
        let distance_metric = grid.metric();
        let positions = grid.positions().map(|(id, pos)| (id.to_string(), pos)).collect();
        let terrain = grid
            .features()
            .into_iter()
            .map(|(position, tile)| TerrainCell { position, tile })
            .collect();
        Ok(SpatialState {
            width,
            height,
            distance_metric,
            positions,
            terrain,
            roster: (0..self.combatants.len()).map(|i| self.combatant_view(i)).collect(),
        })
    }
}

/// First free slot on a side's column (every second row), then any free
/// tile on that column, then any free tile at all.
fn default_position(grid: &Grid, is_monster: bool) -> Option<GridPosition> {
    let x = if is_monster {
        (grid.width() - 2).max(0)
    } else {
        (grid.width() - 1).min(1)
    };
    let free = |pos: GridPosition| grid.is_valid_position(pos) && !grid.is_occupied(pos);

    (1..grid.height())
        .step_by(2)
        .chain(0..grid.height())
        .map(|y| GridPosition::new(x, y))
        .chain(
            (0..grid.height())
                .flat_map(|y| (0..grid.width()).map(move |x| GridPosition::new(x, y))),
        )
        .find(|&pos| free(pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::dice::ScriptedRolls;

    fn hero(name: &str) -> CharacterSnapshot {
        CharacterSnapshot::new(name, CharacterClass::Fighter, 12, 15)
    }

    fn monster(name: &str) -> CharacterSnapshot {
        CharacterSnapshot::new(name, CharacterClass::Monster, 7, 13)
    }

    fn session() -> CombatSession {
        CombatSession::with_roller(
            "s1",
            SessionSetup::default(),
            Box::new(ScriptedRolls::new([10])),
        )
    }

    #[test]
    fn test_start_orders_by_initiative() {
        let mut s = session();
        s.add_combatant(CombatantSpec::new("a", hero("A")).with_initiative(12)).unwrap();
        s.add_combatant(CombatantSpec::new("b", hero("B")).with_initiative(18)).unwrap();
        s.add_combatant(CombatantSpec::new("c", hero("C")).with_initiative(12)).unwrap();
        s.start().unwrap();
        assert_eq!(s.order(), ["b", "a", "c"]);
        assert_eq!(s.turn_index(), Some(0));
        assert_eq!(s.current_combatant().map(|c| c.id.as_str()), Some("b"));
        assert_eq!(s.round(), 1);
    }

    #[test]
    fn test_rolled_initiative_adds_dex() {
        let mut s = session();
        let mut snapshot = hero("Quick");
        snapshot.abilities.dexterity = 3;
        let added = s.add_combatant(CombatantSpec::new("q", snapshot)).unwrap();
        assert_eq!(added.outcome.initiative, 13);
    }

    #[test]
    fn test_empty_session_has_no_turn() {
        let mut s = session();
        s.start().unwrap();
        assert_eq!(s.turn_index(), None);
        assert!(s.current_combatant().is_none());

        s.add_combatant(CombatantSpec::new("late", hero("Late")).with_initiative(1)).unwrap();
        assert_eq!(s.turn_index(), Some(0));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut s = session();
        s.add_combatant(CombatantSpec::new("a", hero("A"))).unwrap();
        let err = s.add_combatant(CombatantSpec::new("a", hero("A2"))).unwrap_err();
        assert_eq!(err.kind(), crate::combat::ErrorKind::Validation);
    }

    #[test]
    fn test_late_joiner_goes_last() {
        let mut s = session();
        s.add_combatant(CombatantSpec::new("a", hero("A")).with_initiative(5)).unwrap();
        s.start().unwrap();
        s.add_combatant(CombatantSpec::new("b", hero("B")).with_initiative(25)).unwrap();
        assert_eq!(s.order(), ["a", "b"]);
    }

    #[test]
    fn test_default_placement() {
        let mut s = session();
        s.add_combatant(CombatantSpec::new("p1", hero("P1"))).unwrap();
        s.add_combatant(CombatantSpec::new("p2", hero("P2"))).unwrap();
        s.add_combatant(CombatantSpec::new("m1", monster("M1"))).unwrap();
        s.start().unwrap();
        assert!(!s.has_grid());

        let state = s.spatial_state().unwrap();
        assert_eq!((state.width, state.height), (20, 15));
        assert_eq!(state.positions["p1"], GridPosition::new(1, 1));
        assert_eq!(state.positions["p2"], GridPosition::new(1, 3));
        assert_eq!(state.positions["m1"], GridPosition::new(18, 1));
    }

    #[test]
    fn test_explicit_positions_win() {
        let mut s = session();
        s.add_combatant(CombatantSpec::new("p1", hero("P1"))).unwrap();
        s.add_combatant(CombatantSpec::new("p2", hero("P2")).at(1, 1)).unwrap();
        s.start().unwrap();
        assert!(s.has_grid());
        let grid = s.grid().unwrap();
        assert_eq!(grid.position_of("p2"), Some(GridPosition::new(1, 1)));
        assert_eq!(grid.position_of("p1"), Some(GridPosition::new(1, 3)));
    }

    #[test]
    fn test_terrain_setup_applied() {
        let setup = SessionSetup {
            terrain: vec![TerrainFeature {
                terrain: Terrain::Blocking,
                positions: vec![GridPosition::new(5, 5), GridPosition::new(50, 50)],
                cover_bonus: None,
                elevation: None,
            }],
            ..Default::default()
        };
        let mut s = CombatSession::with_roller("s2", setup, Box::new(ScriptedRolls::new([10])));
        s.start().unwrap();
        let state = s.spatial_state().unwrap();
        assert_eq!(state.terrain.len(), 1);
        assert_eq!(state.terrain[0].tile.terrain, Terrain::Blocking);
    }

    #[test]
    fn test_ended_session_rejects_mutation() {
        let mut s = session();
        s.add_combatant(CombatantSpec::new("a", hero("A"))).unwrap();
        s.start().unwrap();
        s.end().unwrap();
        assert!(!s.has_grid());
        let err = s.add_combatant(CombatantSpec::new("b", hero("B"))).unwrap_err();
        assert_eq!(err, CombatError::State(StateError::SessionEnded));
        assert_eq!(s.end().unwrap_err(), CombatError::State(StateError::SessionEnded));
        assert!(s.spatial_state().is_err());
    }

    #[test]
    fn test_set_terrain_on_occupied_tile() {
        let mut s = session();
        s.add_combatant(CombatantSpec::new("p1", hero("P1")).at(2, 2)).unwrap();
        s.start().unwrap();
        let err = s
            .set_terrain(GridPosition::new(2, 2), Terrain::Blocking, None)
            .unwrap_err();
        assert_eq!(err.kind(), crate::combat::ErrorKind::State);

        let tile = s
            .set_terrain(GridPosition::new(2, 2), Terrain::Difficult, None)
            .unwrap();
        assert_eq!(tile.terrain, Terrain::Difficult);
        assert!(s.set_terrain(GridPosition::new(40, 2), Terrain::Open, None).is_err());
    }

    #[test]
    fn test_view_is_the_wire_shape() {
        let mut s = session();
        s.add_combatant(CombatantSpec::new("a", hero("A")).with_initiative(12).at(1, 1))
            .unwrap();
        s.start().unwrap();
        let json = serde_json::to_value(s.view()).unwrap();
        let a = &json["combatants"][0];
        assert_eq!(a["id"], "a");
        assert_eq!(a["max_hp"], 12);
        assert_eq!(a["position"], serde_json::json!({ "x": 1, "y": 1 }));
        assert_eq!(a["economy"]["action"], true);
    }

    #[test]
    fn test_log_is_append_only() {
        let mut s = session();
        s.add_combatant(CombatantSpec::new("a", hero("A"))).unwrap();
        s.start().unwrap();
        let types: Vec<ActionType> = s.log().iter().map(|r| r.action_type).collect();
        assert_eq!(types, [ActionType::AddCombatant, ActionType::StartCombat]);
    }
}
