//! Action kinds and the audit records they produce
//!
//! Every resolved action appends one [`ActionRecord`] to its session's log
//! and is handed to an [`ActionSink`] for persistence.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    StartCombat,
    Attack,
    Throw,
    Heal,
    Move,
    BonusAction,
    Reaction,
    DeathSave,
    SavingThrow,
    Condition,
    EndTurn,
    AddCombatant,
    RemoveCombatant,
    EndCombat,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::StartCombat => "start_combat",
            ActionType::Attack => "attack",
            ActionType::Throw => "throw",
            ActionType::Heal => "heal",
            ActionType::Move => "move",
            ActionType::BonusAction => "bonus_action",
            ActionType::Reaction => "reaction",
            ActionType::DeathSave => "death_save",
            ActionType::SavingThrow => "saving_throw",
            ActionType::Condition => "condition",
            ActionType::EndTurn => "end_turn",
            ActionType::AddCombatant => "add_combatant",
            ActionType::RemoveCombatant => "remove_combatant",
            ActionType::EndCombat => "end_combat",
        };
        write!(f, "{}", s)
    }
}

/// Bonus actions with built-in effects, plus a record-only fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BonusAction {
    /// 1d4 + spellcasting modifier to a creature within 60 ft
    HealingWord { target: String },
    /// Fighter self-heal of 1d10 + level
    SecondWind,
    Other {
        name: String,
        #[serde(default)]
        detail: Option<String>,
    },
}

/// Reactions with built-in effects, plus a record-only fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reaction {
    /// A melee weapon attack against a creature within reach
    OpportunityAttack { target: String },
    Other {
        name: String,
        #[serde(default)]
        detail: Option<String>,
    },
}

/// Immutable log entry for one resolved action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub session_id: String,
    pub actor_id: Option<String>,
    pub target_id: Option<String>,
    pub action_type: ActionType,
    pub round: u32,
    pub input: serde_json::Value,
    pub result: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(session_id: &str, action_type: ActionType, round: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            actor_id: None,
            target_id: None,
            action_type,
            round,
            input: serde_json::Value::Null,
            result: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn actor(mut self, id: &str) -> Self {
        self.actor_id = Some(id.to_string());
        self
    }

    pub fn target(mut self, id: &str) -> Self {
        self.target_id = Some(id.to_string());
        self
    }

    pub fn input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    /// Attach a serializable result payload
    pub fn result<T: Serialize>(mut self, result: &T) -> Self {
        self.result = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
        self
    }
}

/// Destination for resolved action records
pub trait ActionSink: Send + Sync {
    fn record(&self, record: &ActionRecord);
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ActionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ActionRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ActionSink for MemorySink {
    fn record(&self, record: &ActionRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Emits each record as a structured log event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ActionSink for TracingSink {
    fn record(&self, record: &ActionRecord) {
        info!(
            session = %record.session_id,
            action = %record.action_type,
            round = record.round,
            actor = record.actor_id.as_deref().unwrap_or("-"),
            target = record.target_id.as_deref().unwrap_or("-"),
            result = %record.result,
            "action resolved"
        );
    }
}
