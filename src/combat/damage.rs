//! Damage types and modifiers
//!
//! Handles damage calculation with:
//! - The ruleset's damage types (slashing, fire, necrotic, etc.)
//! - Immunity (0% damage)
//! - Resistance (50% damage)
//! - Vulnerability (200% damage)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Types of damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    /// Slashing damage (swords, axes)
    Slashing,
    /// Piercing damage (arrows, spears)
    Piercing,
    /// Bludgeoning damage (maces, fists, thrown rocks)
    #[default]
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Psychic,
    Force,
    Thunder,
}

impl FromStr for DamageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slashing" => Ok(DamageType::Slashing),
            "piercing" => Ok(DamageType::Piercing),
            "bludgeoning" => Ok(DamageType::Bludgeoning),
            "fire" => Ok(DamageType::Fire),
            "cold" | "ice" => Ok(DamageType::Cold),
            "lightning" | "electric" => Ok(DamageType::Lightning),
            "acid" => Ok(DamageType::Acid),
            "poison" => Ok(DamageType::Poison),
            "necrotic" => Ok(DamageType::Necrotic),
            "radiant" => Ok(DamageType::Radiant),
            "psychic" => Ok(DamageType::Psychic),
            "force" => Ok(DamageType::Force),
            "thunder" => Ok(DamageType::Thunder),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for DamageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Psychic => "psychic",
            DamageType::Force => "force",
            DamageType::Thunder => "thunder",
        };
        write!(f, "{}", s)
    }
}

/// Modifier for damage resistance/immunity/vulnerability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageModifier {
    /// Immune - takes 0% damage
    Immune,
    /// Resistant - takes 50% damage (rounded down)
    Resistant,
    /// Normal - takes 100% damage
    Normal,
    /// Vulnerable - takes 200% damage
    Vulnerable,
}

impl DamageModifier {
    /// Apply this modifier to damage amount
    pub fn apply(&self, damage: i32) -> i32 {
        match self {
            DamageModifier::Immune => 0,
            DamageModifier::Resistant => damage / 2,
            DamageModifier::Normal => damage,
            DamageModifier::Vulnerable => damage.saturating_mul(2),
        }
    }
}

/// Result of a damage calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageResult {
    /// Rolled damage before modifiers
    pub base_damage: i32,
    /// Damage after resistances/vulnerabilities
    pub final_damage: i32,
    pub damage_type: DamageType,
    pub modifier: DamageModifier,
    pub is_critical: bool,
}

/// A combatant's resistances, immunities and vulnerabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DamageProfile {
    modifiers: HashMap<DamageType, DamageModifier>,
}

impl DamageProfile {
    /// Create a new empty damage profile (all normal)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a damage modifier for a type
    pub fn set(&mut self, dtype: DamageType, modifier: DamageModifier) {
        if modifier == DamageModifier::Normal {
            self.modifiers.remove(&dtype);
        } else {
            self.modifiers.insert(dtype, modifier);
        }
    }

    /// Get the modifier for a damage type
    pub fn get(&self, dtype: DamageType) -> DamageModifier {
        self.modifiers
            .get(&dtype)
            .copied()
            .unwrap_or(DamageModifier::Normal)
    }

    pub fn with_immunity(mut self, dtype: DamageType) -> Self {
        self.set(dtype, DamageModifier::Immune);
        self
    }

    pub fn with_resistance(mut self, dtype: DamageType) -> Self {
        self.set(dtype, DamageModifier::Resistant);
        self
    }

    pub fn with_vulnerability(mut self, dtype: DamageType) -> Self {
        self.set(dtype, DamageModifier::Vulnerable);
        self
    }

    /// Calculate damage after applying modifiers
    pub fn calculate_damage(&self, base: i32, dtype: DamageType, is_crit: bool) -> DamageResult {
        let modifier = self.get(dtype);
        DamageResult {
            base_damage: base,
            final_damage: modifier.apply(base.max(0)),
            damage_type: dtype,
            modifier,
            is_critical: is_crit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_modifier_apply() {
        assert_eq!(DamageModifier::Immune.apply(10), 0);
        assert_eq!(DamageModifier::Resistant.apply(11), 5);
        assert_eq!(DamageModifier::Normal.apply(10), 10);
        assert_eq!(DamageModifier::Vulnerable.apply(10), 20);
        assert_eq!(DamageModifier::Vulnerable.apply(i32::MAX), i32::MAX);
    }

    #[test]
    fn test_calculate_damage() {
        let profile = DamageProfile::new()
            .with_immunity(DamageType::Poison)
            .with_resistance(DamageType::Cold)
            .with_vulnerability(DamageType::Radiant);

        assert_eq!(profile.calculate_damage(10, DamageType::Poison, false).final_damage, 0);
        assert_eq!(profile.calculate_damage(10, DamageType::Cold, false).final_damage, 5);
        assert_eq!(profile.calculate_damage(10, DamageType::Acid, false).final_damage, 10);
        assert_eq!(profile.calculate_damage(10, DamageType::Radiant, true).final_damage, 20);
    }

    #[test]
    fn test_setting_normal_clears_entry() {
        let mut profile = DamageProfile::new().with_resistance(DamageType::Fire);
        profile.set(DamageType::Fire, DamageModifier::Normal);
        assert_eq!(profile, DamageProfile::new());
    }

    #[test]
    fn test_damage_type_parsing() {
        assert_eq!("fire".parse::<DamageType>(), Ok(DamageType::Fire));
        assert_eq!("SLASHING".parse::<DamageType>(), Ok(DamageType::Slashing));
        assert_eq!("ice".parse::<DamageType>(), Ok(DamageType::Cold));
        assert!("physical".parse::<DamageType>().is_err());
    }

    #[test]
    fn test_profile_serde_shape() {
        let profile = DamageProfile::new().with_resistance(DamageType::Fire);
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json, serde_json::json!({"fire": "resistant"}));
    }
}
