//! Combatants and the character snapshots they are built from
//!
//! A [`CharacterSnapshot`] is read-only data supplied by whatever owns the
//! character sheet. A [`Combatant`] wraps a snapshot with the state that
//! changes during an encounter: hit points, conditions, death saves and the
//! per-turn action economy.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::conditions::{Condition, ConditionSet};
use super::damage::{DamageProfile, DamageType};
use super::dice::{proficiency_bonus, DiceRoll};

/// Character classes known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterClass {
    Barbarian,
    Bard,
    Cleric,
    Druid,
    Fighter,
    Monk,
    Paladin,
    Ranger,
    Rogue,
    Sorcerer,
    Warlock,
    Wizard,
    /// Non-player creature
    Monster,
}

impl CharacterClass {
    /// Classes allowed to heal with an action
    pub const SPELLCASTERS: [CharacterClass; 8] = [
        CharacterClass::Bard,
        CharacterClass::Cleric,
        CharacterClass::Druid,
        CharacterClass::Paladin,
        CharacterClass::Ranger,
        CharacterClass::Sorcerer,
        CharacterClass::Warlock,
        CharacterClass::Wizard,
    ];

    pub fn is_spellcaster(&self) -> bool {
        Self::SPELLCASTERS.contains(self)
    }

    /// Spellcasting ability modifier for this class
    pub fn spellcasting_modifier(&self, abilities: &AbilityModifiers) -> i32 {
        match self {
            CharacterClass::Cleric | CharacterClass::Druid | CharacterClass::Ranger => {
                abilities.wisdom
            }
            CharacterClass::Wizard => abilities.intelligence,
            CharacterClass::Bard
            | CharacterClass::Paladin
            | CharacterClass::Sorcerer
            | CharacterClass::Warlock => abilities.charisma,
            _ => 0,
        }
    }
}

impl FromStr for CharacterClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "barbarian" => Ok(CharacterClass::Barbarian),
            "bard" => Ok(CharacterClass::Bard),
            "cleric" => Ok(CharacterClass::Cleric),
            "druid" => Ok(CharacterClass::Druid),
            "fighter" => Ok(CharacterClass::Fighter),
            "monk" => Ok(CharacterClass::Monk),
            "paladin" => Ok(CharacterClass::Paladin),
            "ranger" => Ok(CharacterClass::Ranger),
            "rogue" => Ok(CharacterClass::Rogue),
            "sorcerer" => Ok(CharacterClass::Sorcerer),
            "warlock" => Ok(CharacterClass::Warlock),
            "wizard" => Ok(CharacterClass::Wizard),
            "monster" => Ok(CharacterClass::Monster),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

/// Ability modifiers (not raw scores)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityModifiers {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl AbilityModifiers {
    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponProperty {
    Finesse,
    Ranged,
    Ammunition,
    Thrown,
    Reach,
    Light,
    Heavy,
    TwoHanded,
    Versatile,
    Loading,
}

impl FromStr for WeaponProperty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "finesse" => Ok(WeaponProperty::Finesse),
            "ranged" => Ok(WeaponProperty::Ranged),
            "ammunition" => Ok(WeaponProperty::Ammunition),
            "thrown" => Ok(WeaponProperty::Thrown),
            "reach" => Ok(WeaponProperty::Reach),
            "light" => Ok(WeaponProperty::Light),
            "heavy" => Ok(WeaponProperty::Heavy),
            "two_handed" => Ok(WeaponProperty::TwoHanded),
            "versatile" => Ok(WeaponProperty::Versatile),
            "loading" => Ok(WeaponProperty::Loading),
            _ => Err(()),
        }
    }
}

/// Normal and long range in feet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponRange {
    pub normal: u32,
    pub long: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub damage: DiceRoll,
    #[serde(default)]
    pub damage_type: DamageType,
    #[serde(default)]
    pub properties: Vec<WeaponProperty>,
    #[serde(default)]
    pub enchantment_bonus: i32,
    #[serde(default)]
    pub range: Option<WeaponRange>,
    #[serde(default = "default_proficient")]
    pub proficient: bool,
}

fn default_proficient() -> bool {
    true
}

impl Weapon {
    pub fn new(name: impl Into<String>, damage: DiceRoll, damage_type: DamageType) -> Self {
        Self {
            name: name.into(),
            damage,
            damage_type,
            properties: Vec::new(),
            enchantment_bonus: 0,
            range: None,
            proficient: true,
        }
    }

    pub fn with_properties(mut self, properties: impl IntoIterator<Item = WeaponProperty>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_range(mut self, normal: u32, long: u32) -> Self {
        self.range = Some(WeaponRange { normal, long });
        self
    }

    pub fn with_enchantment(mut self, bonus: i32) -> Self {
        self.enchantment_bonus = bonus;
        self
    }

    /// A 1 + STR punch
    pub fn unarmed() -> Self {
        Self::new("Unarmed strike", DiceRoll::new(1, 1, 0), DamageType::Bludgeoning)
    }

    /// Anything picked up and thrown: 1d4, range 20/60, no proficiency
    pub fn improvised_thrown(name: impl Into<String>) -> Self {
        let mut weapon = Self::new(name, DiceRoll::new(1, 4, 0), DamageType::Bludgeoning)
            .with_properties([WeaponProperty::Thrown])
            .with_range(20, 60);
        weapon.proficient = false;
        weapon
    }

    pub fn has(&self, property: WeaponProperty) -> bool {
        self.properties.contains(&property)
    }

    pub fn is_ranged(&self) -> bool {
        self.has(WeaponProperty::Ranged) || self.has(WeaponProperty::Ammunition)
    }

    /// Melee reach in feet
    pub fn reach(&self) -> u32 {
        if self.has(WeaponProperty::Reach) {
            10
        } else {
            5
        }
    }

    /// Ability modifier this weapon attacks with
    pub fn attack_modifier(&self, abilities: &AbilityModifiers) -> i32 {
        if self.has(WeaponProperty::Finesse) {
            abilities.strength.max(abilities.dexterity)
        } else if self.is_ranged() {
            abilities.dexterity
        } else {
            abilities.strength
        }
    }
}

/// Read-only stats provided by the character sheet owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub name: String,
    pub class: CharacterClass,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub abilities: AbilityModifiers,
    pub max_hp: i32,
    /// HP carried into the encounter; defaults to `max_hp`
    #[serde(default)]
    pub current_hp: Option<i32>,
    pub armor_class: i32,
    /// Walking speed in feet
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default)]
    pub weapon: Option<Weapon>,
    #[serde(default)]
    pub damage_profile: DamageProfile,
    #[serde(default)]
    pub save_proficiencies: Vec<Ability>,
}

fn default_level() -> u32 {
    1
}

fn default_speed() -> u32 {
    30
}

impl CharacterSnapshot {
    pub fn new(
        name: impl Into<String>,
        class: CharacterClass,
        max_hp: i32,
        armor_class: i32,
    ) -> Self {
        Self {
            name: name.into(),
            class,
            level: 1,
            abilities: AbilityModifiers::default(),
            max_hp,
            current_hp: None,
            armor_class,
            speed: 30,
            weapon: None,
            damage_profile: DamageProfile::default(),
            save_proficiencies: Vec::new(),
        }
    }

    pub fn proficiency_bonus(&self) -> i32 {
        proficiency_bonus(self.level)
    }

    /// Weapon used when an attack names none
    pub fn default_weapon(&self) -> Weapon {
        self.weapon.clone().unwrap_or_else(Weapon::unarmed)
    }

    /// Total to-hit bonus with a weapon
    pub fn attack_bonus(&self, weapon: &Weapon) -> i32 {
        let proficiency = if weapon.proficient { self.proficiency_bonus() } else { 0 };
        weapon
            .attack_modifier(&self.abilities)
            .saturating_add(proficiency)
            .saturating_add(weapon.enchantment_bonus)
    }

    pub fn is_monster(&self) -> bool {
        self.class == CharacterClass::Monster
    }
}

/// The four per-turn action economy flags. `true` means available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEconomy {
    pub action: bool,
    pub bonus_action: bool,
    pub movement: bool,
    pub reaction: bool,
}

impl Default for ActionEconomy {
    fn default() -> Self {
        Self {
            action: true,
            bonus_action: true,
            movement: true,
            reaction: true,
        }
    }
}

impl ActionEconomy {
    pub fn available(&self, slot: ActionSlot) -> bool {
        match slot {
            ActionSlot::Action => self.action,
            ActionSlot::BonusAction => self.bonus_action,
            ActionSlot::Movement => self.movement,
            ActionSlot::Reaction => self.reaction,
        }
    }

    /// Spend a slot (true -> false)
    pub fn spend(&mut self, slot: ActionSlot) {
        match slot {
            ActionSlot::Action => self.action = false,
            ActionSlot::BonusAction => self.bonus_action = false,
            ActionSlot::Movement => self.movement = false,
            ActionSlot::Reaction => self.reaction = false,
        }
    }

    /// Start-of-turn refresh; the reaction is handled separately
    pub fn reset_turn(&mut self) {
        self.action = true;
        self.bonus_action = true;
        self.movement = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSlot {
    Action,
    BonusAction,
    Movement,
    Reaction,
}

impl std::fmt::Display for ActionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionSlot::Action => "action",
            ActionSlot::BonusAction => "bonus action",
            ActionSlot::Movement => "movement",
            ActionSlot::Reaction => "reaction",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
}

/// Outcome of applying damage to a combatant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageApplied {
    pub absorbed_by_temp: i32,
    pub hp_lost: i32,
    pub knocked_out: bool,
    pub killed: bool,
}

#[derive(Debug, Clone)]
pub struct Combatant {
    pub id: String,
    pub snapshot: Arc<CharacterSnapshot>,
    pub initiative: i32,
    pub current_hp: i32,
    pub temp_hp: i32,
    pub conditions: ConditionSet,
    pub death_saves: DeathSaves,
    pub economy: ActionEconomy,
    /// Set once a death save is rolled, cleared when the turn ends
    pub death_save_rolled: bool,
}

impl Combatant {
    pub fn new(id: impl Into<String>, snapshot: Arc<CharacterSnapshot>, initiative: i32) -> Self {
        let current_hp = snapshot
            .current_hp
            .unwrap_or(snapshot.max_hp)
            .clamp(0, snapshot.max_hp);
        let mut combatant = Self {
            id: id.into(),
            snapshot,
            initiative,
            current_hp,
            temp_hp: 0,
            conditions: ConditionSet::new(),
            death_saves: DeathSaves::default(),
            economy: ActionEconomy::default(),
            death_save_rolled: false,
        };
        if current_hp == 0 {
            combatant.conditions.insert(Condition::Unconscious);
        }
        combatant
    }

    pub fn name(&self) -> &str {
        &self.snapshot.name
    }

    pub fn max_hp(&self) -> i32 {
        self.snapshot.max_hp
    }

    pub fn is_dead(&self) -> bool {
        self.conditions.has(Condition::Dead)
    }

    pub fn is_conscious(&self) -> bool {
        self.current_hp > 0 && !self.is_dead()
    }

    pub fn is_stable(&self) -> bool {
        self.conditions.has(Condition::Stable)
    }

    /// At 0 HP, not stable and not dead
    pub fn is_dying(&self) -> bool {
        self.current_hp == 0 && !self.is_dead() && !self.is_stable()
    }

    pub fn can_act(&self) -> bool {
        self.conditions.can_act()
    }

    /// Apply damage: temporary HP first, then real HP floored at 0.
    ///
    /// Damage taken while already at 0 HP counts as a failed death save
    /// (two on a critical hit). Damage that would leave HP at or below
    /// `-max_hp` kills outright.
    pub fn apply_damage(&mut self, amount: i32, critical: bool) -> DamageApplied {
        let mut result = DamageApplied::default();
        if amount <= 0 || self.is_dead() {
            return result;
        }

        let absorbed = amount.min(self.temp_hp);
        self.temp_hp -= absorbed;
        result.absorbed_by_temp = absorbed;
        let remaining = amount - absorbed;
        if remaining == 0 {
            return result;
        }

        if self.current_hp == 0 {
            self.conditions.remove(Condition::Stable);
            if remaining >= self.max_hp() {
                self.die();
            } else {
                self.add_death_save_failures(if critical { 2 } else { 1 });
            }
            result.killed = self.is_dead();
            return result;
        }

        let raw = self.current_hp - remaining;
        result.hp_lost = remaining.min(self.current_hp);
        self.current_hp = raw.max(0);

        if self.current_hp == 0 {
            result.knocked_out = self.conditions.insert(Condition::Unconscious);
            if raw <= -self.max_hp() {
                self.die();
            }
        }
        result.killed = self.is_dead();
        result
    }

    /// Refresh the per-turn flags as this combatant's turn ends
    pub fn finish_turn(&mut self) {
        self.economy.reset_turn();
        self.death_save_rolled = false;
    }

    /// Heal; returns the HP actually restored. Clamped at `max_hp`.
    /// Healing an unconscious combatant revives it.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if amount <= 0 || self.is_dead() {
            return 0;
        }
        let before = self.current_hp;
        self.current_hp = self.current_hp.saturating_add(amount).min(self.max_hp());
        if before == 0 && self.current_hp > 0 {
            self.revive();
        }
        self.current_hp - before
    }

    /// Grant temporary HP; it does not stack, the larger pool wins
    pub fn grant_temp_hp(&mut self, amount: i32) {
        self.temp_hp = self.temp_hp.max(amount.max(0));
    }

    pub fn add_death_save_success(&mut self) {
        self.death_saves.successes = (self.death_saves.successes + 1).min(3);
        if self.death_saves.successes == 3 {
            self.death_saves = DeathSaves::default();
            self.conditions.insert(Condition::Stable);
        }
    }

    pub fn add_death_save_failures(&mut self, count: u8) {
        self.death_saves.failures = (self.death_saves.failures + count).min(3);
        if self.death_saves.failures >= 3 {
            self.die();
        }
    }

    /// Natural 20 on a death save: back up with 1 HP
    pub fn regain_consciousness(&mut self) {
        self.current_hp = self.current_hp.max(1);
        self.revive();
    }

    fn revive(&mut self) {
        self.death_saves = DeathSaves::default();
        self.conditions.remove(Condition::Unconscious);
        self.conditions.remove(Condition::Stable);
    }

    fn die(&mut self) {
        self.current_hp = 0;
        self.conditions.remove(Condition::Stable);
        self.conditions.insert(Condition::Unconscious);
        self.conditions.insert(Condition::Dead);
    }
}
