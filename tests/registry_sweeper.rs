//! Concurrent access and idle eviction through the session registry

use std::sync::Arc;
use std::time::Duration;

use skirmish::combat::{CharacterClass, CharacterSnapshot, CombatantSpec, MemorySink};
use skirmish::{Config, SessionRegistry};

fn roster() -> Vec<CombatantSpec> {
    vec![
        CombatantSpec::new("hero", CharacterSnapshot::new("Hero", CharacterClass::Fighter, 12, 16))
            .with_initiative(15),
        CombatantSpec::new("orc", CharacterSnapshot::new("Orc", CharacterClass::Monster, 15, 13))
            .with_initiative(8),
    ]
}

#[tokio::test]
async fn sweeper_evicts_idle_sessions() {
    let config = Config {
        idle_timeout_secs: 0,
        ..Default::default()
    };
    let registry = SessionRegistry::shared(&config, Arc::new(MemorySink::new()));
    registry.start_session("stale", roster()).unwrap();
    assert_eq!(registry.len(), 1);

    let sweeper = registry.spawn_idle_sweeper(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    sweeper.shutdown().await;

    assert!(registry.is_empty());
}

#[tokio::test]
async fn sweeper_keeps_active_sessions() {
    let registry = SessionRegistry::shared(&Config::default(), Arc::new(MemorySink::new()));
    registry.start_session("busy", roster()).unwrap();

    let sweeper = registry.spawn_idle_sweeper(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(50)).await;
    sweeper.shutdown().await;

    assert!(registry.contains("busy"));
}

#[tokio::test]
async fn sessions_resolve_in_parallel() {
    let sink = Arc::new(MemorySink::new());
    let registry = SessionRegistry::shared(&Config::default(), sink.clone());

    let mut tasks = Vec::new();
    for n in 0..8 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let id = format!("table-{}", n);
            registry.start_session(&id, roster()).unwrap();
            registry.end_turn(&id).unwrap();
            registry.end_turn(&id).unwrap();
            registry.session_view(&id).unwrap()
        }));
    }
    for task in tasks {
        let view = task.await.unwrap();
        assert_eq!(view.round, 2);
        assert_eq!(view.current_combatant.as_deref(), Some("hero"));
    }

    assert_eq!(registry.len(), 8);
    // per session: two additions, start and two turn ends
    assert_eq!(sink.len(), 8 * 5);
}
