//! Dice rolling and d20 resolution
//!
//! Parses dice notation like "2d6+3", "1d20", "4d6-2" and resolves the
//! d20 checks of the ruleset: attack rolls, saving throws and death saves.
//! Every roll draws from an injected [`RollSource`] so sessions can be
//! replayed from a seed or a scripted sequence.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest dice count accepted
pub const MAX_DICE: u32 = 100;

/// Largest die accepted
pub const MAX_SIDES: u32 = 1000;

/// `[count]d<size>[+/-modifier]`, or a bare flat modifier
static DICE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<count>\d+)?d(?P<sides>\d+)(?P<modifier>[+-]\d+)?|(?P<flat>[+-]?\d+))$")
        .unwrap()
});

/// Dice notation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("invalid dice notation: {0:?}")]
    InvalidNotation(String),

    #[error("die size must be at least 1")]
    ZeroSides,

    #[error("too many dice ({0} > {max})", max = MAX_DICE)]
    TooManyDice(u32),

    #[error("die too large (d{0} > d{max})", max = MAX_SIDES)]
    TooManySides(u32),
}

/// Source of die results.
///
/// Implementations must return a value in `1..=sides`.
pub trait RollSource: Send {
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Adapter from any `rand` generator
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng + Send> RollSource for RngSource<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.0.random_range(1..=sides.max(1))
    }
}

/// Replays a fixed sequence of die faces.
///
/// Values are clamped into the die's range. Once the script runs out the
/// last value repeats (or 1 if the script was empty).
#[derive(Debug, Clone, Default)]
pub struct ScriptedRolls {
    rolls: VecDeque<u32>,
    last: u32,
}

impl ScriptedRolls {
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            last: 1,
        }
    }

    /// Number of scripted values not yet consumed
    pub fn remaining(&self) -> usize {
        self.rolls.len()
    }
}

impl RollSource for ScriptedRolls {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if let Some(next) = self.rolls.pop_front() {
            self.last = next;
        }
        self.last.clamp(1, sides.max(1))
    }
}

/// A parsed dice roll specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

/// Result of rolling a [`DiceRoll`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    pub total: i32,
    pub dice: Vec<u32>,
    pub modifier: i32,
}

impl DiceRoll {
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self { count, sides, modifier }
    }

    /// A roll with no dice that always totals `value`
    pub fn flat(value: i32) -> Self {
        Self::new(0, 1, value)
    }

    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        parse_dice(notation)
    }

    /// Reject dice outside `MAX_DICE` / `MAX_SIDES`
    pub fn validate(&self) -> Result<(), DiceError> {
        if self.sides == 0 {
            return Err(DiceError::ZeroSides);
        }
        if self.count > MAX_DICE {
            return Err(DiceError::TooManyDice(self.count));
        }
        if self.sides > MAX_SIDES {
            return Err(DiceError::TooManySides(self.sides));
        }
        Ok(())
    }

    /// Roll and return individual die results plus total.
    /// The total saturates at the `i32` bounds.
    pub fn roll(&self, source: &mut dyn RollSource) -> RollOutcome {
        let dice: Vec<u32> = (0..self.count).map(|_| source.roll_die(self.sides)).collect();
        let sum: i64 = dice.iter().map(|&d| i64::from(d)).sum();
        RollOutcome {
            total: clamp_total(sum + i64::from(self.modifier)),
            dice,
            modifier: self.modifier,
        }
    }

    /// Get the minimum possible result
    pub fn min(&self) -> i32 {
        clamp_total(i64::from(self.count) + i64::from(self.modifier))
    }

    /// Get the maximum possible result
    pub fn max(&self) -> i32 {
        clamp_total(i64::from(self.count) * i64::from(self.sides) + i64::from(self.modifier))
    }

    /// Get the expected average (rounded down)
    pub fn average(&self) -> i32 {
        let avg_per_die = (1.0 + self.sides as f64) / 2.0;
        (self.count as f64 * avg_per_die + self.modifier as f64) as i32
    }
}

fn clamp_total(total: i64) -> i32 {
    total.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl FromStr for DiceRoll {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.count, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.count, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

/// Parse a dice notation string like "2d6+3"
pub fn parse_dice(notation: &str) -> Result<DiceRoll, DiceError> {
    let normalized: String = notation
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let caps = DICE_REGEX
        .captures(&normalized)
        .ok_or_else(|| DiceError::InvalidNotation(notation.to_string()))?;

    let invalid = || DiceError::InvalidNotation(notation.to_string());

    if let Some(flat) = caps.name("flat") {
        let value: i32 = flat.as_str().parse().map_err(|_| invalid())?;
        return Ok(DiceRoll::flat(value));
    }

    let count: u32 = match caps.name("count") {
        Some(m) => m.as_str().parse().map_err(|_| invalid())?,
        None => 1, // "d6" means "1d6"
    };
    let sides: u32 = caps["sides"].parse().map_err(|_| invalid())?;
    let modifier: i32 = match caps.name("modifier") {
        Some(m) => m.as_str().parse().map_err(|_| invalid())?,
        None => 0,
    };

    let roll = DiceRoll { count, sides, modifier };
    roll.validate()?;
    Ok(roll)
}

/// Parse and roll in one step
pub fn roll(notation: &str, source: &mut dyn RollSource) -> Result<RollOutcome, DiceError> {
    Ok(parse_dice(notation)?.roll(source))
}

/// Advantage state for a d20 roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advantage {
    #[default]
    Normal,
    /// Roll twice, keep the higher
    Advantage,
    /// Roll twice, keep the lower
    Disadvantage,
}

/// Roll a single d20 under the given advantage state
pub fn roll_d20(source: &mut dyn RollSource, advantage: Advantage) -> u32 {
    let first = source.roll_die(20);
    match advantage {
        Advantage::Normal => first,
        Advantage::Advantage => first.max(source.roll_die(20)),
        Advantage::Disadvantage => first.min(source.roll_die(20)),
    }
}

/// Check if a d20 roll is a natural 20 (critical hit)
pub fn is_critical(roll: u32) -> bool {
    roll == 20
}

/// Check if a d20 roll is a natural 1 (critical fail)
pub fn is_fumble(roll: u32) -> bool {
    roll == 1
}

/// Outcome of an attack roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    /// The kept d20 face
    pub natural: u32,
    /// d20 + attack bonus
    pub total: i32,
    pub hit: bool,
    pub critical: bool,
}

impl AttackRoll {
    /// Resolve an already-rolled d20 against a target AC
    pub fn resolve(natural: u32, attack_bonus: i32, target_ac: i32) -> Self {
        let total = (natural as i32).saturating_add(attack_bonus);
        let critical = is_critical(natural);
        // Natural 20 always hits, natural 1 always misses
        let hit = critical || (!is_fumble(natural) && total >= target_ac);
        Self {
            natural,
            total,
            hit,
            critical,
        }
    }
}

pub fn attack_roll(attack_bonus: i32, target_ac: i32, source: &mut dyn RollSource) -> AttackRoll {
    attack_roll_with(attack_bonus, target_ac, Advantage::Normal, source)
}

pub fn attack_roll_with(
    attack_bonus: i32,
    target_ac: i32,
    advantage: Advantage,
    source: &mut dyn RollSource,
) -> AttackRoll {
    AttackRoll::resolve(roll_d20(source, advantage), attack_bonus, target_ac)
}

/// Roll weapon damage. A critical doubles the dice, never the modifier.
/// The total is floored at 0.
pub fn damage_roll(
    dice_count: u32,
    dice_size: u32,
    modifier: i32,
    critical: bool,
    source: &mut dyn RollSource,
) -> RollOutcome {
    let count = if critical { dice_count.saturating_mul(2) } else { dice_count };
    let mut outcome = DiceRoll::new(count, dice_size, modifier).roll(source);
    outcome.total = outcome.total.max(0);
    outcome
}

/// Outcome of a saving throw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRoll {
    pub natural: u32,
    pub total: i32,
    pub success: bool,
}

pub fn saving_throw(
    ability_modifier: i32,
    proficient: bool,
    proficiency_bonus: i32,
    dc: i32,
    source: &mut dyn RollSource,
) -> SaveRoll {
    let natural = source.roll_die(20);
    let bonus = ability_modifier.saturating_add(if proficient { proficiency_bonus } else { 0 });
    let total = (natural as i32).saturating_add(bonus);
    SaveRoll {
        natural,
        total,
        success: total >= dc,
    }
}

/// Outcome of a single death saving throw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaveRoll {
    pub natural: u32,
    pub success: bool,
    /// Natural 20 or natural 1
    pub critical: bool,
}

pub fn death_save(source: &mut dyn RollSource) -> DeathSaveRoll {
    let natural = source.roll_die(20);
    DeathSaveRoll {
        natural,
        success: natural >= 10,
        critical: is_critical(natural) || is_fumble(natural),
    }
}

/// Proficiency bonus by character level
pub fn proficiency_bonus(level: u32) -> i32 {
    match level {
        0..=4 => 2,
        5..=8 => 3,
        9..=12 => 4,
        13..=16 => 5,
        _ => 6,
    }
}

/// Ability modifier from a raw ability score
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded(seed: u64) -> RngSource<StdRng> {
        RngSource(StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_parse_basic() {
        let roll = parse_dice("2d6").unwrap();
        assert_eq!(roll, DiceRoll::new(2, 6, 0));
    }

    #[test]
    fn test_parse_modifiers() {
        assert_eq!(parse_dice("1d20+5").unwrap(), DiceRoll::new(1, 20, 5));
        assert_eq!(parse_dice("3d8-2").unwrap(), DiceRoll::new(3, 8, -2));
        assert_eq!(parse_dice("  2D10 + 3 ").unwrap(), DiceRoll::new(2, 10, 3));
    }

    #[test]
    fn test_parse_implicit_one_and_flat() {
        assert_eq!(parse_dice("d6").unwrap(), DiceRoll::new(1, 6, 0));
        assert_eq!(parse_dice("7").unwrap(), DiceRoll::flat(7));
        assert_eq!(parse_dice("0d1+5").unwrap(), DiceRoll::new(0, 1, 5));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(parse_dice("abc"), Err(DiceError::InvalidNotation(_))));
        assert!(parse_dice("2d").is_err());
        assert!(parse_dice("d").is_err());
        assert!(parse_dice("-1d6").is_err());
        assert_eq!(parse_dice("2d0"), Err(DiceError::ZeroSides));
        assert_eq!(parse_dice("101d6"), Err(DiceError::TooManyDice(101)));
        assert!(parse_dice("100d6").is_ok());
    }

    #[test]
    fn test_oversized_dice_rejected() {
        assert_eq!(parse_dice("1d4294967295"), Err(DiceError::TooManySides(4294967295)));
        assert_eq!(parse_dice("100d1001"), Err(DiceError::TooManySides(1001)));
        assert!(parse_dice("100d1000").is_ok());
        assert_eq!(DiceRoll::new(2, 0, 0).validate(), Err(DiceError::ZeroSides));
    }

    #[test]
    fn test_huge_totals_saturate() {
        let big = DiceRoll::new(100, u32::MAX, i32::MAX);
        assert_eq!(big.max(), i32::MAX);
        let out = big.roll(&mut ScriptedRolls::new([u32::MAX]));
        assert_eq!(out.total, i32::MAX);

        let low = DiceRoll::new(0, 1, i32::MIN).roll(&mut ScriptedRolls::new(Vec::new()));
        assert_eq!(low.total, i32::MIN);
    }

    #[test]
    fn test_zero_dice_is_flat() {
        let mut rng = seeded(7);
        for _ in 0..50 {
            let out = roll("0d1+5", &mut rng).unwrap();
            assert_eq!(out.total, 5);
            assert!(out.dice.is_empty());
        }
    }

    #[test]
    fn test_d20_distribution() {
        let mut rng = seeded(20);
        let mut counts = [0u32; 20];
        for _ in 0..10_000 {
            let out = roll("1d20", &mut rng).unwrap();
            assert!((1..=20).contains(&out.total));
            counts[(out.total - 1) as usize] += 1;
        }
        // 500 expected per face, sigma ~22
        for (face, count) in counts.iter().enumerate() {
            assert!(
                (350..=650).contains(count),
                "face {} rolled {} times",
                face + 1,
                count
            );
        }
    }

    #[test]
    fn test_detailed_roll() {
        let out = DiceRoll::new(3, 6, 2).roll(&mut ScriptedRolls::new([1, 4, 6]));
        assert_eq!(out.dice, vec![1, 4, 6]);
        assert_eq!(out.total, 13);
        assert_eq!(out.modifier, 2);
    }

    #[test]
    fn test_min_max_average_display() {
        let roll = DiceRoll::new(2, 6, 3);
        assert_eq!(roll.min(), 5);
        assert_eq!(roll.max(), 15);
        assert_eq!(roll.average(), 10);
        assert_eq!(DiceRoll::new(2, 6, 0).to_string(), "2d6");
        assert_eq!(DiceRoll::new(3, 8, -2).to_string(), "3d8-2");
    }

    #[test]
    fn test_natural_one_always_misses() {
        for bonus in [0, 10, 50] {
            let out = attack_roll(bonus, 1, &mut ScriptedRolls::new([1]));
            assert!(!out.hit);
            assert!(!out.critical);
        }
    }

    #[test]
    fn test_natural_twenty_always_hits() {
        let out = attack_roll(-10, 40, &mut ScriptedRolls::new([20]));
        assert!(out.hit);
        assert!(out.critical);
    }

    #[test]
    fn test_attack_threshold() {
        assert!(AttackRoll::resolve(13, 5, 18).hit);
        assert!(!AttackRoll::resolve(12, 5, 18).hit);
    }

    #[test]
    fn test_advantage_keeps_best() {
        let mut rolls = ScriptedRolls::new([4, 17]);
        assert_eq!(roll_d20(&mut rolls, Advantage::Advantage), 17);
        let mut rolls = ScriptedRolls::new([4, 17]);
        assert_eq!(roll_d20(&mut rolls, Advantage::Disadvantage), 4);
    }

    #[test]
    fn test_critical_doubles_dice_not_modifier() {
        let out = damage_roll(1, 8, 3, true, &mut ScriptedRolls::new([5, 6]));
        assert_eq!(out.dice.len(), 2);
        assert_eq!(out.total, 14);
    }

    #[test]
    fn test_damage_floor() {
        let out = damage_roll(1, 4, -5, false, &mut ScriptedRolls::new([1]));
        assert_eq!(out.total, 0);
    }

    #[test]
    fn test_saving_throw() {
        let save = saving_throw(2, true, 3, 15, &mut ScriptedRolls::new([10]));
        assert!(save.success);
        assert_eq!(save.total, 15);
        let save = saving_throw(2, false, 3, 15, &mut ScriptedRolls::new([10]));
        assert!(!save.success);
    }

    #[test]
    fn test_death_save_faces() {
        let roll = |face| death_save(&mut ScriptedRolls::new([face]));
        assert_eq!((roll(20).success, roll(20).critical), (true, true));
        assert_eq!((roll(1).success, roll(1).critical), (false, true));
        assert_eq!((roll(10).success, roll(10).critical), (true, false));
        assert_eq!((roll(9).success, roll(9).critical), (false, false));
    }

    #[test]
    fn test_proficiency_steps() {
        assert_eq!(proficiency_bonus(1), 2);
        assert_eq!(proficiency_bonus(4), 2);
        assert_eq!(proficiency_bonus(5), 3);
        assert_eq!(proficiency_bonus(12), 4);
        assert_eq!(proficiency_bonus(13), 5);
        assert_eq!(proficiency_bonus(17), 6);
        assert_eq!(proficiency_bonus(20), 6);
    }

    #[test]
    fn test_ability_modifier() {
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(15), 2);
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(1), -5);
    }

    #[test]
    fn test_scripted_rolls_clamp_and_repeat() {
        let mut rolls = ScriptedRolls::new([25, 3]);
        assert_eq!(rolls.roll_die(20), 20);
        assert_eq!(rolls.roll_die(6), 3);
        assert_eq!(rolls.remaining(), 0);
        assert_eq!(rolls.roll_die(6), 3);
    }
}
