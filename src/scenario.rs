//! Scripted encounters
//!
//! A scenario is a JSON document naming a session, its roster and a list
//! of commands. Running it yields one JSON line per command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::combat::{CombatantSpec, SessionSetup};
use crate::command::{error_json, execute, Command};
use crate::registry::SessionRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_session")]
    pub session: String,
    /// Falls back to the registry defaults
    #[serde(default)]
    pub setup: Option<SessionSetup>,
    pub combatants: Vec<CombatantSpec>,
    #[serde(default)]
    pub commands: Vec<Command>,
}

fn default_session() -> String {
    "scenario".to_string()
}

/// One command addressed to a session, as read from a request stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub session: String,
    pub command: Command,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Start the session and run every command. A rejected command is
    /// reported and the rest still run.
    pub fn run(self, registry: &SessionRegistry) -> Result<Vec<Value>> {
        let setup = self.setup.unwrap_or_else(|| registry.default_setup());
        let view = registry.start_session_with(&self.session, self.combatants, setup)?;
        info!(session = %self.session, commands = self.commands.len(), "running scenario");

        let mut lines = vec![json!({ "op": "start", "ok": view })];
        for command in self.commands {
            lines.push(respond(registry, &self.session, command));
        }
        Ok(lines)
    }
}

/// Execute one command and wrap the outcome as `{"op", "ok"}` or `{"op", "error"}`
pub fn respond(registry: &SessionRegistry, session: &str, command: Command) -> Value {
    let op = command.op();
    match execute(registry, session, command) {
        Ok(value) => json!({ "op": op, "ok": value }),
        Err(err) => {
            warn!(session, op, error = %err, "command rejected");
            json!({ "op": op, "error": error_json(&err) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::MemorySink;
    use crate::config::Config;
    use std::io::Write;
    use std::sync::Arc;

    const SCENARIO: &str = r#"{
        "session": "ambush",
        "setup": { "seed": 42 },
        "combatants": [
            { "id": "hero", "initiative": 18,
              "snapshot": { "name": "Hero", "class": "fighter", "max_hp": 20, "armor_class": 16 } },
            { "id": "goblin", "initiative": 12,
              "snapshot": { "name": "Goblin", "class": "monster", "max_hp": 7, "armor_class": 13 } }
        ],
        "commands": [
            { "op": "move", "combatant": "goblin", "x": 10, "y": 1 },
            { "op": "move", "combatant": "hero", "x": 3, "y": 1 },
            { "op": "end_turn" },
            { "op": "state" }
        ]
    }"#;

    #[test]
    fn test_scenario_runs_every_command() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENARIO.as_bytes()).unwrap();
        let scenario = Scenario::from_file(file.path()).unwrap();
        assert_eq!(scenario.session, "ambush");

        let registry = SessionRegistry::new(&Config::default(), Arc::new(MemorySink::new()));
        let lines = scenario.run(&registry).unwrap();
        assert_eq!(lines.len(), 5);
        // goblin moved out of turn
        assert_eq!(lines[1]["error"]["kind"], "state");
        assert_eq!(lines[2]["ok"]["outcome"]["to"], json!({ "x": 3, "y": 1 }));
        assert_eq!(lines[4]["ok"]["current_combatant"], "goblin");
    }

    #[test]
    fn test_request_shape() {
        let line = r#"{ "session": "s1", "command": { "op": "end_turn" } }"#;
        let request: Request = serde_json::from_str(line).unwrap();
        assert_eq!(request.command, Command::EndTurn);
    }
}
