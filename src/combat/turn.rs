//! Turn advancement
//!
//! The order fixed at [`CombatSession::start`] is walked round-robin.
//! Wrapping past the last combatant starts a new round.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::session::CombatSession;

/// What changed when the turn passed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAdvance {
    pub previous: Option<String>,
    pub current: Option<String>,
    pub turn_index: Option<usize>,
    pub round: u32,
    pub new_round: bool,
}

impl CombatSession {
    /// Refresh the outgoing combatant's per-turn budget, step to the next
    /// combatant and give it back its reaction.
    pub fn advance_turn(&mut self) -> TurnAdvance {
        let previous = self.current_combatant().map(|c| c.id.clone());
        let round_before = self.round();

        if let Some(id) = previous.as_deref() {
            if let Ok(outgoing) = self.combatant_mut(id) {
                outgoing.finish_turn();
            }
        }

        if let Some(index) = self.turn_index {
            let next = (index + 1) % self.order.len();
            self.turn_index = Some(next);
            if next == 0 {
                self.next_round();
            }
            self.refresh_reaction();
        }

        let current = self.current_combatant().map(|c| c.id.clone());
        debug!(
            session = %self.id(),
            from = previous.as_deref().unwrap_or("-"),
            to = current.as_deref().unwrap_or("-"),
            round = self.round(),
            "turn advanced"
        );
        TurnAdvance {
            previous,
            current,
            turn_index: self.turn_index,
            round: self.round(),
            new_round: self.round() != round_before,
        }
    }

    fn refresh_reaction(&mut self) {
        let Some(id) = self.current_combatant().map(|c| c.id.clone()) else {
            return;
        };
        if let Ok(incoming) = self.combatant_mut(&id) {
            incoming.economy.reaction = true;
        }
    }

    /// Keep `turn_index` valid after removing the entry at `removed`.
    ///
    /// Whoever was current stays current. If the current combatant itself
    /// left, the next one in line takes over, wrapping into a new round
    /// when it was last.
    pub(crate) fn reclamp_after_removal(&mut self, removed: usize) {
        let Some(index) = self.turn_index else {
            return;
        };
        if self.order.is_empty() {
            self.turn_index = None;
            return;
        }
        if removed < index {
            self.turn_index = Some(index - 1);
        } else if removed == index {
            if index >= self.order.len() {
                self.turn_index = Some(0);
                self.next_round();
            }
            self.refresh_reaction();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::combatant::{ActionSlot, CharacterClass, CharacterSnapshot};
    use crate::combat::dice::ScriptedRolls;
    use crate::combat::session::{CombatantSpec, SessionSetup};

    fn started(initiatives: &[(&str, i32)]) -> CombatSession {
        let mut s = CombatSession::with_roller(
            "t",
            SessionSetup::default(),
            Box::new(ScriptedRolls::new([10])),
        );
        for (id, init) in initiatives {
            let snapshot = CharacterSnapshot::new(*id, CharacterClass::Fighter, 10, 12);
            s.add_combatant(CombatantSpec::new(*id, snapshot).with_initiative(*init)).unwrap();
        }
        s.start().unwrap();
        s
    }

    fn current(s: &CombatSession) -> Option<&str> {
        s.current_combatant().map(|c| c.id.as_str())
    }

    #[test]
    fn test_round_robin_and_rounds() {
        let mut s = started(&[("a", 18), ("b", 12)]);
        assert_eq!(current(&s), Some("a"));

        let step = s.advance_turn();
        assert_eq!(step.previous.as_deref(), Some("a"));
        assert_eq!(step.current.as_deref(), Some("b"));
        assert!(!step.new_round);

        let step = s.advance_turn();
        assert_eq!(step.current.as_deref(), Some("a"));
        assert!(step.new_round);
        assert_eq!(s.round(), 2);
    }

    #[test]
    fn test_flags_reset_on_advance() {
        let mut s = started(&[("a", 18), ("b", 12)]);
        {
            let a = s.combatant_mut("a").unwrap();
            a.economy.spend(ActionSlot::Action);
            a.economy.spend(ActionSlot::Movement);
        }
        s.combatant_mut("b").unwrap().economy.spend(ActionSlot::Reaction);

        s.advance_turn();
        let a = s.combatant("a").unwrap();
        assert!(a.economy.action && a.economy.movement);
        assert!(s.combatant("b").unwrap().economy.reaction);
    }

    #[test]
    fn test_single_combatant_wraps_each_turn() {
        let mut s = started(&[("solo", 10)]);
        s.advance_turn();
        s.advance_turn();
        assert_eq!(s.round(), 3);
        assert_eq!(s.turn_index(), Some(0));
    }

    #[test]
    fn test_empty_order_never_advances() {
        let mut s = started(&[]);
        let step = s.advance_turn();
        assert_eq!(step.current, None);
        assert_eq!(s.turn_index(), None);
        assert_eq!(s.round(), 1);
    }

    #[test]
    fn test_removal_before_current_keeps_current() {
        let mut s = started(&[("a", 20), ("b", 15), ("c", 10)]);
        s.advance_turn();
        s.advance_turn();
        assert_eq!(current(&s), Some("c"));
        s.remove_combatant("a").unwrap();
        assert_eq!(current(&s), Some("c"));
        assert_eq!(s.turn_index(), Some(1));
    }

    #[test]
    fn test_removing_last_current_wraps() {
        let mut s = started(&[("a", 20), ("b", 15)]);
        s.advance_turn();
        s.remove_combatant("b").unwrap();
        assert_eq!(current(&s), Some("a"));
        assert_eq!(s.round(), 2);
    }

    #[test]
    fn test_removing_everyone_clears_index() {
        let mut s = started(&[("a", 20)]);
        s.remove_combatant("a").unwrap();
        assert_eq!(s.turn_index(), None);
        assert!(s.current_combatant().is_none());
    }

    #[test]
    fn test_turn_index_always_valid() {
        let mut s = started(&[("a", 20), ("b", 15), ("c", 10), ("d", 5)]);
        let removals = ["c", "a", "d"];
        for id in removals {
            s.advance_turn();
            s.remove_combatant(id).unwrap();
            match s.turn_index() {
                Some(i) => assert!(i < s.order().len()),
                None => assert!(s.order().is_empty()),
            }
        }
    }
}
