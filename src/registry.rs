//! Session registry
//!
//! Holds every live combat session behind its own lock:
//! - one action at a time per session, sessions run in parallel
//! - every resolved action is forwarded to the configured [`ActionSink`]
//! - sessions untouched for the idle timeout are evicted, either on demand
//!   or by a background sweeper task

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::combat::{
    Ability, ActionRecord, ActionSink, AttackOutcome, BonusAction, BonusActionOutcome,
    CombatError, CombatResult, CombatSession, CombatantSpec, CombatantView, Condition,
    ConditionOutcome, DeathSaveOutcome, HealOutcome, MoveOutcome, NotFoundError, Reaction,
    ReactionOutcome, Resolved, RollSource, SavingThrowOutcome, SessionSetup, SessionView,
    SpatialState, Weapon,
};
use crate::config::Config;
use crate::grid::{GridPosition, Terrain, Tile};

/// A session plus its bookkeeping
pub struct SessionSlot {
    session: CombatSession,
    last_access: Instant,
}

impl SessionSlot {
    fn touch(&mut self) -> &mut CombatSession {
        self.last_access = Instant::now();
        &mut self.session
    }
}

/// Arena of combat sessions keyed by id
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionSlot>>>>,
    sink: Arc<dyn ActionSink>,
    defaults: SessionSetup,
    idle_timeout: Duration,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.read().len())
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    pub fn new(config: &Config, sink: Arc<dyn ActionSink>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            sink,
            defaults: config.session_setup(),
            idle_timeout: config.idle_timeout(),
        }
    }

    /// Create a new shared registry
    pub fn shared(config: &Config, sink: Arc<dyn ActionSink>) -> Arc<Self> {
        Arc::new(Self::new(config, sink))
    }

    /// Setup used by [`Self::start_session`]
    pub fn default_setup(&self) -> SessionSetup {
        self.defaults.clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Start a session with the configured defaults
    pub fn start_session(
        &self,
        id: &str,
        combatants: Vec<CombatantSpec>,
    ) -> CombatResult<SessionView> {
        self.start_session_with(id, combatants, self.default_setup())
    }

    pub fn start_session_with(
        &self,
        id: &str,
        combatants: Vec<CombatantSpec>,
        setup: SessionSetup,
    ) -> CombatResult<SessionView> {
        let roller = setup.roller();
        self.start_session_with_roller(id, combatants, setup, roller)
    }

    /// Start a session that draws dice from `roller`
    pub fn start_session_with_roller(
        &self,
        id: &str,
        combatants: Vec<CombatantSpec>,
        setup: SessionSetup,
        roller: Box<dyn RollSource>,
    ) -> CombatResult<SessionView> {
        if id.is_empty() {
            return Err(CombatError::validation("session id must not be empty"));
        }
        if self.contains(id) {
            return Err(CombatError::validation(format!("session {} already exists", id)));
        }

        let mut session = CombatSession::with_roller(id, setup, roller);
        let mut records = Vec::with_capacity(combatants.len() + 1);
        for spec in combatants {
            records.push(session.add_combatant(spec)?.record);
        }
        let started = session.start()?;
        records.push(started.record);

        {
            let mut sessions = self.sessions.write();
            if sessions.contains_key(id) {
                return Err(CombatError::validation(format!("session {} already exists", id)));
            }
            sessions.insert(
                id.to_string(),
                Arc::new(Mutex::new(SessionSlot {
                    session,
                    last_access: Instant::now(),
                })),
            );
        }
        for record in &records {
            self.sink.record(record);
        }
        info!(session = id, "session registered");
        Ok(started.outcome)
    }

    fn slot(&self, id: &str) -> CombatResult<Arc<Mutex<SessionSlot>>> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| NotFoundError::Session(id.to_string()).into())
    }

    /// Run `f` with exclusive access to one session
    pub fn with_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut CombatSession) -> CombatResult<T>,
    ) -> CombatResult<T> {
        let slot = self.slot(id)?;
        let mut guard = slot.lock();
        // an eviction may have unlinked the slot while we waited on its lock
        let linked = self
            .sessions
            .read()
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, &slot));
        if !linked {
            return Err(NotFoundError::Session(id.to_string()).into());
        }
        let result = f(guard.touch());
        if let Err(err) = &result {
            debug!(session = id, error = %err, "operation rejected");
        }
        result
    }

    fn resolve<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut CombatSession) -> CombatResult<Resolved<T>>,
    ) -> CombatResult<Resolved<T>> {
        let resolved = self.with_session(id, f)?;
        self.sink.record(&resolved.record);
        Ok(resolved)
    }

    pub fn attack(
        &self,
        id: &str,
        attacker: &str,
        target: &str,
        weapon: Option<Weapon>,
    ) -> CombatResult<Resolved<AttackOutcome>> {
        self.resolve(id, |s| s.attack(attacker, target, weapon))
    }

    pub fn throw_item(
        &self,
        id: &str,
        thrower: &str,
        target: &str,
        weapon: Option<Weapon>,
    ) -> CombatResult<Resolved<AttackOutcome>> {
        self.resolve(id, |s| s.throw_item(thrower, target, weapon))
    }

    pub fn heal(
        &self,
        id: &str,
        healer: &str,
        target: &str,
        amount: i32,
    ) -> CombatResult<Resolved<HealOutcome>> {
        self.resolve(id, |s| s.heal(healer, target, amount))
    }

    pub fn move_to(
        &self,
        id: &str,
        combatant: &str,
        x: i32,
        y: i32,
    ) -> CombatResult<Resolved<MoveOutcome>> {
        self.resolve(id, |s| s.move_to(combatant, x, y))
    }

    pub fn bonus_action(
        &self,
        id: &str,
        actor: &str,
        action: BonusAction,
    ) -> CombatResult<Resolved<BonusActionOutcome>> {
        self.resolve(id, |s| s.bonus_action(actor, action))
    }

    pub fn reaction(
        &self,
        id: &str,
        actor: &str,
        reaction: Reaction,
    ) -> CombatResult<Resolved<ReactionOutcome>> {
        self.resolve(id, |s| s.reaction(actor, reaction))
    }

    pub fn death_save(
        &self,
        id: &str,
        combatant: &str,
    ) -> CombatResult<Resolved<DeathSaveOutcome>> {
        self.resolve(id, |s| s.death_save(combatant))
    }

    pub fn saving_throw(
        &self,
        id: &str,
        combatant: &str,
        ability: Ability,
        dc: i32,
    ) -> CombatResult<Resolved<SavingThrowOutcome>> {
        self.resolve(id, |s| s.saving_throw(combatant, ability, dc))
    }

    pub fn set_condition(
        &self,
        id: &str,
        combatant: &str,
        condition: Condition,
        applied: bool,
    ) -> CombatResult<Resolved<ConditionOutcome>> {
        self.resolve(id, |s| s.set_condition(combatant, condition, applied))
    }

    /// End the current turn; returns the updated session view
    pub fn end_turn(&self, id: &str) -> CombatResult<Resolved<SessionView>> {
        self.resolve(id, |s| {
            let Resolved { record, .. } = s.end_turn()?;
            Ok(Resolved {
                outcome: s.view(),
                record,
            })
        })
    }

    pub fn add_combatant(
        &self,
        id: &str,
        spec: CombatantSpec,
    ) -> CombatResult<Resolved<CombatantView>> {
        self.resolve(id, |s| s.add_combatant(spec))
    }

    pub fn remove_combatant(
        &self,
        id: &str,
        combatant: &str,
    ) -> CombatResult<Resolved<CombatantView>> {
        self.resolve(id, |s| s.remove_combatant(combatant))
    }

    pub fn set_terrain(
        &self,
        id: &str,
        position: GridPosition,
        terrain: Terrain,
        cover_bonus: Option<i32>,
    ) -> CombatResult<Tile> {
        self.with_session(id, |s| s.set_terrain(position, terrain, cover_bonus))
    }

    pub fn get_spatial_state(&self, id: &str) -> CombatResult<SpatialState> {
        self.with_session(id, |s| s.spatial_state())
    }

    pub fn valid_moves(&self, id: &str, combatant: &str) -> CombatResult<Vec<GridPosition>> {
        self.with_session(id, |s| s.valid_moves(combatant))
    }

    pub fn attack_range(
        &self,
        id: &str,
        combatant: &str,
        weapon: Option<Weapon>,
    ) -> CombatResult<Vec<GridPosition>> {
        self.with_session(id, |s| s.attack_range(combatant, weapon))
    }

    pub fn session_view(&self, id: &str) -> CombatResult<SessionView> {
        self.with_session(id, |s| Ok(s.view()))
    }

    pub fn action_log(&self, id: &str) -> CombatResult<Vec<ActionRecord>> {
        self.with_session(id, |s| Ok(s.log().to_vec()))
    }

    /// End the encounter. The session stays readable until evicted.
    pub fn end_session(&self, id: &str) -> CombatResult<Resolved<SessionView>> {
        self.resolve(id, |s| s.end())
    }

    /// Drop a session outright
    pub fn remove_session(&self, id: &str) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Drop every session idle for at least the timeout as of `now`.
    /// Sessions busy resolving an action are skipped.
    pub fn evict_idle(&self, now: Instant) -> Vec<String> {
        let mut evicted = Vec::new();
        self.sessions.write().retain(|id, slot| {
            let Some(guard) = slot.try_lock() else {
                return true;
            };
            let idle = now.saturating_duration_since(guard.last_access);
            if idle >= self.idle_timeout {
                evicted.push(id.clone());
                false
            } else {
                true
            }
        });
        if !evicted.is_empty() {
            info!(count = evicted.len(), "evicted idle sessions");
        }
        evicted
    }

    /// Evict idle sessions every `every` until the handle is shut down
    pub fn spawn_idle_sweeper(self: &Arc<Self>, every: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        registry.evict_idle(Instant::now());
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("idle sweeper stopped");
        });
        SweeperHandle { shutdown_tx, task }
    }
}

/// Handle to a running idle sweeper
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
