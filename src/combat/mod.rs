//! Combat system module
//!
//! Implements tabletop-style tactical combat with:
//! - Dice rolling (e.g., "2d6+3") from an injectable source
//! - Attack resolution with to-hit, cover and damage
//! - Damage types with immunity, resistance and vulnerability
//! - Conditions, unconsciousness and death saves
//! - Initiative order and the per-turn action economy

mod action;
mod combatant;
mod conditions;
mod damage;
mod dice;
mod error;
mod resolver;
mod session;
mod turn;

pub use action::{
    ActionRecord, ActionSink, ActionType, BonusAction, MemorySink, Reaction, TracingSink,
};
pub use combatant::{
    Ability, AbilityModifiers, ActionEconomy, ActionSlot, CharacterClass, CharacterSnapshot,
    Combatant, DamageApplied, DeathSaves, Weapon, WeaponProperty, WeaponRange,
};
pub use conditions::{attack_advantage, Condition, ConditionSet};
pub use damage::{DamageModifier, DamageProfile, DamageResult, DamageType};
pub use dice::{
    ability_modifier, attack_roll, attack_roll_with, damage_roll, death_save, parse_dice,
    proficiency_bonus, roll, roll_d20, saving_throw, Advantage, AttackRoll, DeathSaveRoll,
    DiceError, DiceRoll, RngSource, RollOutcome, RollSource, SaveRoll, ScriptedRolls,
};
pub use error::{CombatError, CombatResult, ErrorKind, NotFoundError, StateError};
pub use resolver::{
    AttackOutcome, BonusActionOutcome, ConditionOutcome, DeathSaveOutcome, HealOutcome,
    MoveOutcome, ReactionOutcome, SavingThrowOutcome,
};
pub use session::{
    CombatSession, CombatantSpec, CombatantView, Phase, Resolved, SessionSetup, SessionView,
    SpatialState, TerrainCell, TerrainFeature,
};
pub use turn::TurnAdvance;
