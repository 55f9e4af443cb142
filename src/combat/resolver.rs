//! Action resolution
//!
//! Each operation validates everything up front and only then mutates, so
//! a rejected action leaves the session exactly as it was. The checks run
//! in a fixed order:
//! - session is active
//! - actor (and target) exist
//! - it is the actor's turn (reactions and saving throws are exempt)
//! - actor is able to act
//! - the action economy slot is unspent

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::action::{ActionRecord, ActionType, BonusAction, Reaction};
use super::combatant::{Ability, ActionSlot, CharacterClass, Weapon, WeaponProperty};
use super::conditions::{attack_advantage, Condition};
use super::damage::{DamageResult, DamageType};
use super::dice::{self, Advantage, DiceRoll};
use super::error::{CombatError, CombatResult, StateError};
use super::session::{CombatSession, Resolved};
use super::turn::TurnAdvance;
use crate::grid::GridPosition;

/// Healing word range in feet
const HEALING_WORD_RANGE: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub attacker: String,
    pub target: String,
    pub weapon: String,
    pub hit: bool,
    /// The kept d20 face
    pub natural: u32,
    /// d20 + attack bonus
    pub roll: i32,
    pub critical: bool,
    pub attack_bonus: i32,
    pub target_ac: i32,
    pub cover_bonus: i32,
    pub advantage: Advantage,
    pub distance_ft: Option<u32>,
    /// Damage dealt after resistances, 0 on a miss
    pub damage: i32,
    pub damage_type: DamageType,
    pub damage_detail: Option<DamageResult>,
    pub target_hp: i32,
    pub target_temp_hp: i32,
    pub knocked_out: bool,
    pub killed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealOutcome {
    pub old_hp: i32,
    pub new_hp: i32,
    pub healed: i32,
    pub revived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub success: bool,
    pub from: GridPosition,
    pub to: GridPosition,
    pub path: Vec<GridPosition>,
    pub cost_ft: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusActionOutcome {
    pub action: BonusAction,
    pub target: Option<String>,
    pub heal: Option<HealOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionOutcome {
    pub reaction: Reaction,
    pub attack: Option<AttackOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaveOutcome {
    pub success: bool,
    pub critical: bool,
    pub roll: u32,
    pub successes: u8,
    pub failures: u8,
    pub is_dead: bool,
    pub is_stable: bool,
    pub regained_consciousness: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingThrowOutcome {
    pub ability: Ability,
    pub dc: i32,
    pub success: bool,
    pub roll: u32,
    pub total: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionOutcome {
    pub condition: Condition,
    pub applied: bool,
    pub changed: bool,
    pub conditions: Vec<Condition>,
}

/// Combine two advantage states. Any mix of the two cancels out.
fn combine(a: Advantage, b: Advantage) -> Advantage {
    match (a, b) {
        (Advantage::Normal, other) | (other, Advantage::Normal) => other,
        (x, y) if x == y => x,
        _ => Advantage::Normal,
    }
}

/// How a weapon attack is being made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttackMode {
    /// Main-hand attack with the action
    Standard,
    /// Thrown weapon, always a ranged attack
    Thrown,
    /// Reaction attack, melee only
    Opportunity,
}

impl AttackMode {
    fn slot(&self) -> ActionSlot {
        match self {
            AttackMode::Standard | AttackMode::Thrown => ActionSlot::Action,
            AttackMode::Opportunity => ActionSlot::Reaction,
        }
    }

    fn action_type(&self) -> ActionType {
        match self {
            AttackMode::Standard => ActionType::Attack,
            AttackMode::Thrown => ActionType::Throw,
            AttackMode::Opportunity => ActionType::Reaction,
        }
    }
}

/// Spatial facts that shape an attack
struct Geometry {
    distance: Option<u32>,
    cover: i32,
    range_penalty: Advantage,
}

impl CombatSession {
    /// Shared gate for anything the acting combatant does on its own turn
    fn check_actor(
        &self,
        actor: &str,
        slot: Option<ActionSlot>,
        turn_gated: bool,
    ) -> CombatResult<()> {
        self.ensure_active()?;
        let combatant = self.combatant(actor)?;
        if turn_gated {
            self.ensure_turn(actor)?;
        }
        if !combatant.can_act() {
            return Err(StateError::Incapacitated(actor.to_string()).into());
        }
        if let Some(slot) = slot {
            if !combatant.economy.available(slot) {
                return Err(StateError::ActionSpent(slot).into());
            }
        }
        Ok(())
    }

    fn check_living_target(&self, target: &str) -> CombatResult<()> {
        if self.combatant(target)?.is_dead() {
            return Err(StateError::TargetDead(target.to_string()).into());
        }
        Ok(())
    }

    fn positions(&self, a: &str, b: &str) -> Option<(GridPosition, GridPosition)> {
        let grid = self.grid()?;
        Some((grid.position_of(a)?, grid.position_of(b)?))
    }

    /// Range, sight and cover checks; all pass when either side is off the grid
    fn attack_geometry(
        &self,
        attacker: &str,
        target: &str,
        weapon: &Weapon,
        mode: AttackMode,
    ) -> CombatResult<Geometry> {
        let (Some(grid), Some((from, to))) = (self.grid(), self.positions(attacker, target))
        else {
            return Ok(Geometry {
                distance: None,
                cover: 0,
                range_penalty: Advantage::Normal,
            });
        };

        let distance = grid.distance(from, to);
        if grid.has_full_cover(from, to) {
            return Err(StateError::FullCover.into());
        }

        let mut range_penalty = Advantage::Normal;
        let ranged = mode == AttackMode::Thrown
            || (mode == AttackMode::Standard && weapon.is_ranged());
        if !grid.is_adjacent(from, to) || ranged {
            let reach = if mode == AttackMode::Opportunity || !ranged {
                weapon.reach()
            } else {
                0
            };
            if distance > reach {
                let range = match (ranged, weapon.range) {
                    (true, Some(range)) => range,
                    _ => {
                        return Err(StateError::OutOfRange { distance, range: reach }.into());
                    }
                };
                if distance > range.long {
                    return Err(StateError::OutOfRange {
                        distance,
                        range: range.long,
                    }
                    .into());
                }
                if distance > range.normal {
                    range_penalty = Advantage::Disadvantage;
                }
            }
            if !grid.line_of_sight(from, to) {
                return Err(StateError::NoLineOfSight.into());
            }
        }

        Ok(Geometry {
            distance: Some(distance),
            cover: grid.cover_bonus(from, to),
            range_penalty,
        })
    }

    fn weapon_attack(
        &mut self,
        attacker_id: &str,
        target_id: &str,
        weapon: Weapon,
        mode: AttackMode,
    ) -> CombatResult<Resolved<AttackOutcome>> {
        let slot = mode.slot();
        self.check_actor(attacker_id, Some(slot), mode != AttackMode::Opportunity)?;
        self.check_living_target(target_id)?;
        if attacker_id == target_id {
            return Err(CombatError::validation("a combatant cannot attack itself"));
        }
        if mode == AttackMode::Thrown && !weapon.has(WeaponProperty::Thrown) {
            return Err(CombatError::validation(format!("{} cannot be thrown", weapon.name)));
        }
        weapon.damage.validate()?;

        let geometry = self.attack_geometry(attacker_id, target_id, &weapon, mode)?;

        let attacker = self.combatant(attacker_id)?;
        let target = self.combatant(target_id)?;
        let melee = mode != AttackMode::Thrown
            && !(mode == AttackMode::Standard && weapon.is_ranged());
        let advantage = combine(
            attack_advantage(&attacker.conditions, &target.conditions, melee),
            geometry.range_penalty,
        );
        let attack_bonus = attacker.snapshot.attack_bonus(&weapon);
        let damage_bonus = weapon
            .attack_modifier(&attacker.snapshot.abilities)
            .saturating_add(weapon.enchantment_bonus);
        let target_ac = target.snapshot.armor_class.saturating_add(geometry.cover);
        let profile = target.snapshot.damage_profile.clone();

        let attack = dice::attack_roll_with(attack_bonus, target_ac, advantage, self.roller());
        let mut damage_detail = None;
        if attack.hit {
            let rolled = dice::damage_roll(
                weapon.damage.count,
                weapon.damage.sides,
                weapon.damage.modifier.saturating_add(damage_bonus),
                attack.critical,
                self.roller(),
            );
            damage_detail = Some(profile.calculate_damage(
                rolled.total,
                weapon.damage_type,
                attack.critical,
            ));
        }

        let damage = damage_detail.map_or(0, |d| d.final_damage);
        let applied = {
            let target = self.combatant_mut(target_id)?;
            target.apply_damage(damage, attack.critical)
        };
        self.combatant_mut(attacker_id)?.economy.spend(slot);

        let target = self.combatant(target_id)?;
        let outcome = AttackOutcome {
            attacker: attacker_id.to_string(),
            target: target_id.to_string(),
            weapon: weapon.name.clone(),
            hit: attack.hit,
            natural: attack.natural,
            roll: attack.total,
            critical: attack.critical,
            attack_bonus,
            target_ac,
            cover_bonus: geometry.cover,
            advantage,
            distance_ft: geometry.distance,
            damage,
            damage_type: weapon.damage_type,
            damage_detail,
            target_hp: target.current_hp,
            target_temp_hp: target.temp_hp,
            knocked_out: applied.knocked_out,
            killed: applied.killed,
        };
        debug!(
            session = %self.id(),
            attacker = attacker_id,
            target = target_id,
            hit = outcome.hit,
            damage = outcome.damage,
            "attack resolved"
        );

        let record = self
            .record(mode.action_type())
            .actor(attacker_id)
            .target(target_id)
            .input(json!({ "weapon": weapon }))
            .result(&outcome);
        Ok(Resolved {
            outcome,
            record: self.push_record(record),
        })
    }

    /// Weapon attack with the action. With no weapon named the combatant's
    /// own weapon is used, or an unarmed strike.
    pub fn attack(
        &mut self,
        attacker: &str,
        target: &str,
        weapon: Option<Weapon>,
    ) -> CombatResult<Resolved<AttackOutcome>> {
        let weapon = match weapon {
            Some(w) => w,
            None => self.combatant(attacker)?.snapshot.default_weapon(),
        };
        self.weapon_attack(attacker, target, weapon, AttackMode::Standard)
    }

    /// Ranged attack with a thrown weapon; an improvised throw without one
    pub fn throw_item(
        &mut self,
        thrower: &str,
        target: &str,
        weapon: Option<Weapon>,
    ) -> CombatResult<Resolved<AttackOutcome>> {
        let weapon = weapon.unwrap_or_else(|| Weapon::improvised_thrown("Improvised object"));
        self.weapon_attack(thrower, target, weapon, AttackMode::Thrown)
    }

    fn apply_heal(&mut self, target: &str, amount: i32) -> CombatResult<HealOutcome> {
        let target = self.combatant_mut(target)?;
        let old_hp = target.current_hp;
        let was_down = old_hp == 0;
        let healed = target.heal(amount);
        Ok(HealOutcome {
            old_hp,
            new_hp: target.current_hp,
            healed,
            revived: was_down && target.current_hp > 0,
        })
    }

    /// Spend the action to restore `amount` HP to a target
    pub fn heal(
        &mut self,
        healer: &str,
        target: &str,
        amount: i32,
    ) -> CombatResult<Resolved<HealOutcome>> {
        self.check_actor(healer, Some(ActionSlot::Action), true)?;
        let class = self.combatant(healer)?.snapshot.class;
        if !class.is_spellcaster() {
            return Err(StateError::CannotHeal(class).into());
        }
        if amount <= 0 {
            return Err(CombatError::validation("heal amount must be positive"));
        }
        self.check_living_target(target)?;

        let outcome = self.apply_heal(target, amount)?;
        self.combatant_mut(healer)?.economy.spend(ActionSlot::Action);

        let record = self
            .record(ActionType::Heal)
            .actor(healer)
            .target(target)
            .input(json!({ "amount": amount }))
            .result(&outcome);
        Ok(Resolved {
            outcome,
            record: self.push_record(record),
        })
    }

    /// Walk to `(x, y)` along the cheapest path within the mover's speed
    pub fn move_to(&mut self, mover: &str, x: i32, y: i32) -> CombatResult<Resolved<MoveOutcome>> {
        self.check_actor(mover, Some(ActionSlot::Movement), true)?;
        let dest = GridPosition::new(x, y);
        let speed = {
            let combatant = self.combatant(mover)?;
            let conditions = &combatant.conditions;
            if conditions.has(Condition::Grappled) || conditions.has(Condition::Restrained) {
                0
            } else {
                combatant.snapshot.speed
            }
        };

        let grid = self.ensure_grid()?;
        let from = grid
            .position_of(mover)
            .ok_or_else(|| StateError::NotPlaced(mover.to_string()))?;
        let tile = grid.tile(dest).ok_or_else(|| {
            CombatError::validation(format!("position {} is outside the grid", dest))
        })?;
        if !tile.terrain.is_passable() {
            return Err(StateError::Impassable(dest).into());
        }
        if let Some(occupant) = grid.occupant(dest) {
            return Err(StateError::TileOccupied {
                position: dest,
                occupant: occupant.to_string(),
            }
            .into());
        }

        let path = grid.find_path(from, dest, speed);
        if path.is_empty() {
            return Err(StateError::Unreachable(dest).into());
        }
        let cost_ft = grid
            .path_cost(&path)
            .ok_or(StateError::Unreachable(dest))?;
        grid.move_combatant(mover, dest)?;
        self.combatant_mut(mover)?.economy.spend(ActionSlot::Movement);

        let outcome = MoveOutcome {
            success: true,
            from,
            to: dest,
            path,
            cost_ft,
        };
        let record = self
            .record(ActionType::Move)
            .actor(mover)
            .input(json!({ "x": x, "y": y }))
            .result(&outcome);
        Ok(Resolved {
            outcome,
            record: self.push_record(record),
        })
    }

    pub fn bonus_action(
        &mut self,
        actor: &str,
        action: BonusAction,
    ) -> CombatResult<Resolved<BonusActionOutcome>> {
        self.check_actor(actor, Some(ActionSlot::BonusAction), true)?;

        let (target, heal) = match &action {
            BonusAction::HealingWord { target } => {
                let caster = self.combatant(actor)?;
                let class = caster.snapshot.class;
                if !class.is_spellcaster() {
                    return Err(StateError::CannotHeal(class).into());
                }
                let bonus = class.spellcasting_modifier(&caster.snapshot.abilities);
                self.check_living_target(target)?;
                if let (Some(grid), Some((from, to))) =
                    (self.grid(), self.positions(actor, target))
                {
                    let distance = grid.distance(from, to);
                    if distance > HEALING_WORD_RANGE {
                        return Err(StateError::OutOfRange {
                            distance,
                            range: HEALING_WORD_RANGE,
                        }
                        .into());
                    }
                }
                let amount = DiceRoll::new(1, 4, bonus).roll(self.roller()).total.max(1);
                (Some(target.clone()), Some(self.apply_heal(target, amount)?))
            }
            BonusAction::SecondWind => {
                let fighter = self.combatant(actor)?;
                if fighter.snapshot.class != CharacterClass::Fighter {
                    return Err(CombatError::validation("second wind requires a fighter"));
                }
                let level = fighter.snapshot.level as i32;
                let amount = DiceRoll::new(1, 10, level).roll(self.roller()).total;
                (Some(actor.to_string()), Some(self.apply_heal(actor, amount)?))
            }
            BonusAction::Other { .. } => (None, None),
        };
        self.combatant_mut(actor)?.economy.spend(ActionSlot::BonusAction);

        let mut record = self.record(ActionType::BonusAction).actor(actor).input(json!(action));
        if let Some(target) = target.as_deref() {
            record = record.target(target);
        }
        let outcome = BonusActionOutcome { action, target, heal };
        let record = record.result(&outcome);
        Ok(Resolved {
            outcome,
            record: self.push_record(record),
        })
    }

    /// Reactions may be taken outside the reactor's own turn
    pub fn reaction(
        &mut self,
        actor: &str,
        reaction: Reaction,
    ) -> CombatResult<Resolved<ReactionOutcome>> {
        match &reaction {
            Reaction::OpportunityAttack { target } => {
                let weapon = self.combatant(actor)?.snapshot.default_weapon();
                let attack = self.weapon_attack(actor, target, weapon, AttackMode::Opportunity)?;
                let outcome = ReactionOutcome {
                    reaction: reaction.clone(),
                    attack: Some(attack.outcome),
                };
                Ok(Resolved {
                    outcome,
                    record: attack.record,
                })
            }
            Reaction::Other { .. } => {
                self.check_actor(actor, Some(ActionSlot::Reaction), false)?;
                self.combatant_mut(actor)?.economy.spend(ActionSlot::Reaction);
                let outcome = ReactionOutcome {
                    reaction: reaction.clone(),
                    attack: None,
                };
                let record = self
                    .record(ActionType::Reaction)
                    .actor(actor)
                    .input(json!(reaction))
                    .result(&outcome);
                Ok(Resolved {
                    outcome,
                    record: self.push_record(record),
                })
            }
        }
    }

    /// Roll a death save on the dying combatant's turn
    pub fn death_save(&mut self, id: &str) -> CombatResult<Resolved<DeathSaveOutcome>> {
        self.ensure_active()?;
        let combatant = self.combatant(id)?;
        self.ensure_turn(id)?;
        if combatant.is_dead() {
            return Err(StateError::TargetDead(id.to_string()).into());
        }
        if !combatant.is_dying() {
            return Err(StateError::NotDying(id.to_string()).into());
        }
        if combatant.death_save_rolled {
            return Err(StateError::DeathSaveTaken(id.to_string()).into());
        }

        let roll = dice::death_save(self.roller());
        let combatant = self.combatant_mut(id)?;
        combatant.death_save_rolled = true;
        let mut regained = false;
        if roll.critical && roll.success {
            combatant.regain_consciousness();
            regained = true;
        } else if roll.critical {
            combatant.add_death_save_failures(2);
        } else if roll.success {
            combatant.add_death_save_success();
        } else {
            combatant.add_death_save_failures(1);
        }

        let outcome = DeathSaveOutcome {
            success: roll.success,
            critical: roll.critical,
            roll: roll.natural,
            successes: combatant.death_saves.successes,
            failures: combatant.death_saves.failures,
            is_dead: combatant.is_dead(),
            is_stable: combatant.is_stable(),
            regained_consciousness: regained,
        };
        let record = self.record(ActionType::DeathSave).actor(id).result(&outcome);
        Ok(Resolved {
            outcome,
            record: self.push_record(record),
        })
    }

    /// Saving throw against a DC; no turn or economy requirements
    pub fn saving_throw(
        &mut self,
        id: &str,
        ability: Ability,
        dc: i32,
    ) -> CombatResult<Resolved<SavingThrowOutcome>> {
        self.ensure_not_ended()?;
        let snapshot = self.combatant(id)?.snapshot.clone();
        let proficient = snapshot.save_proficiencies.contains(&ability);
        let roll = dice::saving_throw(
            snapshot.abilities.get(ability),
            proficient,
            snapshot.proficiency_bonus(),
            dc,
            self.roller(),
        );

        let outcome = SavingThrowOutcome {
            ability,
            dc,
            success: roll.success,
            roll: roll.natural,
            total: roll.total,
        };
        let record = self
            .record(ActionType::SavingThrow)
            .actor(id)
            .input(json!({ "ability": ability, "dc": dc }))
            .result(&outcome);
        Ok(Resolved {
            outcome,
            record: self.push_record(record),
        })
    }

    /// Add or clear a status condition. HP-driven states are off limits.
    pub fn set_condition(
        &mut self,
        id: &str,
        condition: Condition,
        applied: bool,
    ) -> CombatResult<Resolved<ConditionOutcome>> {
        self.ensure_not_ended()?;
        if condition.is_vital() {
            return Err(CombatError::validation(format!("{} is managed by hit points", condition)));
        }
        let combatant = self.combatant_mut(id)?;
        let changed = if applied {
            combatant.conditions.insert(condition)
        } else {
            combatant.conditions.remove(condition)
        };
        let outcome = ConditionOutcome {
            condition,
            applied,
            changed,
            conditions: combatant.conditions.iter().collect(),
        };
        let record = self
            .record(ActionType::Condition)
            .target(id)
            .input(json!({ "condition": condition, "applied": applied }))
            .result(&outcome);
        Ok(Resolved {
            outcome,
            record: self.push_record(record),
        })
    }

    /// Close out the current turn and pass to the next combatant
    pub fn end_turn(&mut self) -> CombatResult<Resolved<TurnAdvance>> {
        self.ensure_active()?;
        let Some(current) = self.current_combatant().map(|c| c.id.clone()) else {
            return Err(CombatError::validation("no combatants in the turn order"));
        };
        let round = self.round();
        let outcome = self.advance_turn();
        let record = ActionRecord::new(self.id(), ActionType::EndTurn, round)
            .actor(&current)
            .result(&outcome);
        Ok(Resolved {
            outcome,
            record: self.push_record(record),
        })
    }

    /// Tiles the combatant could move to this turn
    pub fn valid_moves(&mut self, id: &str) -> CombatResult<Vec<GridPosition>> {
        let combatant = self.combatant(id)?;
        let budget = if combatant.economy.movement {
            combatant.snapshot.speed
        } else {
            0
        };
        let grid = self.ensure_grid()?;
        Ok(grid.reachable_positions(id, budget))
    }

    /// Tiles within reach or long range of the combatant's weapon
    pub fn attack_range(
        &mut self,
        id: &str,
        weapon: Option<Weapon>,
    ) -> CombatResult<Vec<GridPosition>> {
        let weapon = match weapon {
            Some(w) => w,
            None => self.combatant(id)?.snapshot.default_weapon(),
        };
        let feet = match (weapon.is_ranged() || weapon.has(WeaponProperty::Thrown), weapon.range) {
            (true, Some(range)) => range.long,
            _ => weapon.reach(),
        };
        let grid = self.ensure_grid()?;
        let center = grid
            .position_of(id)
            .ok_or_else(|| StateError::NotPlaced(id.to_string()))?;
        Ok(grid.positions_within_range(center, feet))
    }
}
