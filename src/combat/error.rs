//! Errors returned by combat operations
//!
//! Every rejection leaves the session untouched. Callers that need a
//! coarse category (for status codes, say) use [`CombatError::kind`].

use serde::Serialize;
use thiserror::Error;

use super::combatant::{ActionSlot, CharacterClass};
use super::dice::DiceError;
use crate::grid::{GridError, GridPosition};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("session has ended")]
    SessionEnded,

    #[error("session is not active")]
    SessionNotActive,

    #[error("session has already started")]
    AlreadyStarted,

    #[error("it is not {0}'s turn")]
    NotYourTurn(String),

    #[error("{0} already used")]
    ActionSpent(ActionSlot),

    #[error("{0} is incapacitated")]
    Incapacitated(String),

    #[error("{0} is dead")]
    TargetDead(String),

    #[error("{0} is not dying")]
    NotDying(String),

    #[error("{0} already rolled a death save this turn")]
    DeathSaveTaken(String),

    #[error("{0} cannot heal")]
    CannotHeal(CharacterClass),

    #[error("{0} is not on the grid")]
    NotPlaced(String),

    #[error("destination {0} is unreachable")]
    Unreachable(GridPosition),

    #[error("position {0} is impassable")]
    Impassable(GridPosition),

    #[error("position {position} is occupied by {occupant}")]
    TileOccupied { position: GridPosition, occupant: String },

    #[error("target is {distance} ft away (range {range} ft)")]
    OutOfRange { distance: u32, range: u32 },

    #[error("no line of sight to target")]
    NoLineOfSight,

    #[error("target has full cover")]
    FullCover,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("session {0} not found")]
    Session(String),

    #[error("combatant {0} not found")]
    Combatant(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    State,
    NotFound,
}

impl CombatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CombatError::Validation(_) => ErrorKind::Validation,
            CombatError::State(_) => ErrorKind::State,
            CombatError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CombatError::Validation(msg.into())
    }
}

impl From<DiceError> for CombatError {
    fn from(err: DiceError) -> Self {
        CombatError::Validation(err.to_string())
    }
}

impl From<GridError> for CombatError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::InvalidDimensions { .. } | GridError::OutOfBounds(_) => {
                CombatError::Validation(err.to_string())
            }
            GridError::Impassable(pos) => StateError::Impassable(pos).into(),
            GridError::Occupied { position, occupant } => {
                StateError::TileOccupied { position, occupant }.into()
            }
            GridError::NotPlaced(id) => StateError::NotPlaced(id).into(),
        }
    }
}

pub type CombatResult<T> = Result<T, CombatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(CombatError::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(
            CombatError::from(StateError::SessionEnded).kind(),
            ErrorKind::State
        );
        assert_eq!(
            CombatError::from(NotFoundError::Combatant("x".into())).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_grid_error_mapping() {
        let out = CombatError::from(GridError::OutOfBounds(GridPosition::new(-1, 0)));
        assert_eq!(out.kind(), ErrorKind::Validation);

        let occupied = CombatError::from(GridError::Occupied {
            position: GridPosition::new(1, 1),
            occupant: "orc".into(),
        });
        assert!(matches!(
            occupied,
            CombatError::State(StateError::TileOccupied { .. })
        ));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            CombatError::from(StateError::ActionSpent(ActionSlot::BonusAction)).to_string(),
            "bonus action already used"
        );
        assert_eq!(
            CombatError::from(NotFoundError::Session("s1".into())).to_string(),
            "session s1 not found"
        );
    }
}
