//! JSON command surface
//!
//! Each [`Command`] names one registry operation. Commands arrive as JSON
//! objects tagged by `op`, e.g. `{"op": "move", "combatant": "hero", "x": 3, "y": 1}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::combat::{
    Ability, BonusAction, CombatError, CombatResult, CombatantSpec, Condition, Reaction,
    SessionSetup, Weapon,
};
use crate::grid::{GridPosition, Terrain};
use crate::registry::SessionRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Start {
        combatants: Vec<CombatantSpec>,
        #[serde(default)]
        setup: Option<SessionSetup>,
    },
    Attack {
        attacker: String,
        target: String,
        #[serde(default)]
        weapon: Option<Weapon>,
    },
    Throw {
        thrower: String,
        target: String,
        #[serde(default)]
        weapon: Option<Weapon>,
    },
    Heal {
        healer: String,
        target: String,
        amount: i32,
    },
    Move {
        combatant: String,
        x: i32,
        y: i32,
    },
    BonusAction {
        actor: String,
        action: BonusAction,
    },
    Reaction {
        actor: String,
        reaction: Reaction,
    },
    DeathSave {
        combatant: String,
    },
    SavingThrow {
        combatant: String,
        ability: Ability,
        dc: i32,
    },
    SetCondition {
        combatant: String,
        condition: Condition,
        #[serde(default = "applied_default")]
        applied: bool,
    },
    EndTurn,
    AddCombatant {
        combatant: CombatantSpec,
    },
    RemoveCombatant {
        combatant: String,
    },
    SetTerrain {
        x: i32,
        y: i32,
        terrain: Terrain,
        #[serde(default)]
        cover_bonus: Option<i32>,
    },
    ValidMoves {
        combatant: String,
    },
    AttackRange {
        combatant: String,
        #[serde(default)]
        weapon: Option<Weapon>,
    },
    State,
    SpatialState,
    Log,
    End,
}

fn applied_default() -> bool {
    true
}

impl Command {
    /// Short name used in logs
    pub fn op(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Attack { .. } => "attack",
            Command::Throw { .. } => "throw",
            Command::Heal { .. } => "heal",
            Command::Move { .. } => "move",
            Command::BonusAction { .. } => "bonus_action",
            Command::Reaction { .. } => "reaction",
            Command::DeathSave { .. } => "death_save",
            Command::SavingThrow { .. } => "saving_throw",
            Command::SetCondition { .. } => "set_condition",
            Command::EndTurn => "end_turn",
            Command::AddCombatant { .. } => "add_combatant",
            Command::RemoveCombatant { .. } => "remove_combatant",
            Command::SetTerrain { .. } => "set_terrain",
            Command::ValidMoves { .. } => "valid_moves",
            Command::AttackRange { .. } => "attack_range",
            Command::State => "state",
            Command::SpatialState => "spatial_state",
            Command::Log => "log",
            Command::End => "end",
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Run one command against a session and return its JSON result
pub fn execute(registry: &SessionRegistry, session: &str, command: Command) -> CombatResult<Value> {
    let value = match command {
        Command::Start { combatants, setup } => {
            let setup = setup.unwrap_or_else(|| registry.default_setup());
            to_json(&registry.start_session_with(session, combatants, setup)?)
        }
        Command::Attack { attacker, target, weapon } => {
            to_json(&registry.attack(session, &attacker, &target, weapon)?)
        }
        Command::Throw { thrower, target, weapon } => {
            to_json(&registry.throw_item(session, &thrower, &target, weapon)?)
        }
        Command::Heal { healer, target, amount } => {
            to_json(&registry.heal(session, &healer, &target, amount)?)
        }
        Command::Move { combatant, x, y } => to_json(&registry.move_to(session, &combatant, x, y)?),
        Command::BonusAction { actor, action } => {
            to_json(&registry.bonus_action(session, &actor, action)?)
        }
        Command::Reaction { actor, reaction } => {
            to_json(&registry.reaction(session, &actor, reaction)?)
        }
        Command::DeathSave { combatant } => to_json(&registry.death_save(session, &combatant)?),
        Command::SavingThrow { combatant, ability, dc } => {
            to_json(&registry.saving_throw(session, &combatant, ability, dc)?)
        }
        Command::SetCondition {
            combatant,
            condition,
            applied,
        } => to_json(&registry.set_condition(session, &combatant, condition, applied)?),
        Command::EndTurn => to_json(&registry.end_turn(session)?),
        Command::AddCombatant { combatant } => {
            to_json(&registry.add_combatant(session, combatant)?)
        }
        Command::RemoveCombatant { combatant } => {
            to_json(&registry.remove_combatant(session, &combatant)?)
        }
        Command::SetTerrain {
            x,
            y,
            terrain,
            cover_bonus,
        } => {
            let position = GridPosition::new(x, y);
            let tile = registry.set_terrain(session, position, terrain, cover_bonus)?;
            json!({ "position": position, "tile": tile })
        }
        Command::ValidMoves { combatant } => to_json(&registry.valid_moves(session, &combatant)?),
        Command::AttackRange { combatant, weapon } => {
            to_json(&registry.attack_range(session, &combatant, weapon)?)
        }
        Command::State => to_json(&registry.session_view(session)?),
        Command::SpatialState => to_json(&registry.get_spatial_state(session)?),
        Command::Log => to_json(&registry.action_log(session)?),
        Command::End => to_json(&registry.end_session(session)?),
    };
    Ok(value)
}

/// JSON shape for a failed command
pub fn error_json(err: &CombatError) -> Value {
    json!({
        "kind": err.kind(),
        "message": err.to_string(),
    })
}
