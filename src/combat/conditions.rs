//! Combatant conditions
//!
//! A closed set of named conditions. Death-state bookkeeping (unconscious,
//! stable, dead) lives here alongside the ordinary status conditions so a
//! combatant's whole status is one exhaustively matchable set.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::dice::Advantage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Blinded,
    Charmed,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    /// At 0 HP
    Unconscious,
    /// At 0 HP with three successful death saves
    Stable,
    Dead,
}

impl Condition {
    /// Whether this condition prevents taking actions
    pub fn prevents_action(&self) -> bool {
        matches!(
            self,
            Condition::Incapacitated
                | Condition::Paralyzed
                | Condition::Petrified
                | Condition::Stunned
                | Condition::Unconscious
                | Condition::Dead
        )
    }

    /// Conditions the engine manages itself from HP and death saves
    pub fn is_vital(&self) -> bool {
        matches!(self, Condition::Unconscious | Condition::Stable | Condition::Dead)
    }
}

impl FromStr for Condition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blinded" | "blind" => Ok(Condition::Blinded),
            "charmed" => Ok(Condition::Charmed),
            "frightened" | "scared" => Ok(Condition::Frightened),
            "grappled" => Ok(Condition::Grappled),
            "incapacitated" => Ok(Condition::Incapacitated),
            "invisible" => Ok(Condition::Invisible),
            "paralyzed" => Ok(Condition::Paralyzed),
            "petrified" => Ok(Condition::Petrified),
            "poisoned" => Ok(Condition::Poisoned),
            "prone" => Ok(Condition::Prone),
            "restrained" => Ok(Condition::Restrained),
            "stunned" => Ok(Condition::Stunned),
            "unconscious" => Ok(Condition::Unconscious),
            "stable" => Ok(Condition::Stable),
            "dead" => Ok(Condition::Dead),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Condition::Blinded => "blinded",
            Condition::Charmed => "charmed",
            Condition::Frightened => "frightened",
            Condition::Grappled => "grappled",
            Condition::Incapacitated => "incapacitated",
            Condition::Invisible => "invisible",
            Condition::Paralyzed => "paralyzed",
            Condition::Petrified => "petrified",
            Condition::Poisoned => "poisoned",
            Condition::Prone => "prone",
            Condition::Restrained => "restrained",
            Condition::Stunned => "stunned",
            Condition::Unconscious => "unconscious",
            Condition::Stable => "stable",
            Condition::Dead => "dead",
        };
        write!(f, "{}", s)
    }
}

/// Conditions currently on a combatant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(BTreeSet<Condition>);

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the condition was newly added
    pub fn insert(&mut self, condition: Condition) -> bool {
        self.0.insert(condition)
    }

    pub fn remove(&mut self, condition: Condition) -> bool {
        self.0.remove(&condition)
    }

    pub fn has(&self, condition: Condition) -> bool {
        self.0.contains(&condition)
    }

    pub fn can_act(&self) -> bool {
        !self.0.iter().any(Condition::prevents_action)
    }

    pub fn iter(&self) -> impl Iterator<Item = Condition> + '_ {
        self.0.iter().copied()
    }
}

/// Advantage state for an attack given both sides' conditions.
/// Advantage and disadvantage cancel out.
pub fn attack_advantage(attacker: &ConditionSet, target: &ConditionSet, melee: bool) -> Advantage {
    let hampered = [
        Condition::Blinded,
        Condition::Poisoned,
        Condition::Prone,
        Condition::Restrained,
    ];
    let disadvantage = hampered
        .into_iter()
        .any(|c| attacker.has(c))
        || target.has(Condition::Invisible)
        || (!melee && target.has(Condition::Prone));

    let advantage = attacker.has(Condition::Invisible)
        || [
            Condition::Blinded,
            Condition::Paralyzed,
            Condition::Petrified,
            Condition::Restrained,
            Condition::Stunned,
            Condition::Unconscious,
        ]
        .into_iter()
        .any(|c| target.has(c))
        || (melee && target.has(Condition::Prone));

    match (advantage, disadvantage) {
        (true, false) => Advantage::Advantage,
        (false, true) => Advantage::Disadvantage,
        _ => Advantage::Normal,
    }
}
