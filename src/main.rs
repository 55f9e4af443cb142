//! skirmish - run combat scenarios or serve JSON requests on stdin

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use skirmish::combat::TracingSink;
use skirmish::scenario::{respond, Request};
use skirmish::{Config, Scenario, SessionRegistry};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "skirmish", about = "Tactical grid combat engine")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixed dice seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// Scenario file; reads one request per line from stdin when omitted
    scenario: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "skirmish=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    // Logs go to stderr so stdout stays machine-readable
    if args.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut config = Config::load(args.config.as_deref())?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let sessions = SessionRegistry::shared(&config, Arc::new(TracingSink));

    if let Some(path) = args.scenario {
        let scenario = Scenario::from_file(&path)?;
        for line in scenario.run(&sessions)? {
            println!("{}", line);
        }
        return Ok(());
    }

    let sweeper = sessions.spawn_idle_sweeper(config.sweep_interval());
    info!("reading requests from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(request) => respond(&sessions, &request.session, request.command),
            Err(err) => {
                warn!(error = %err, "malformed request");
                serde_json::json!({ "error": { "kind": "validation", "message": err.to_string() } })
            }
        };
        println!("{}", reply);
    }
    sweeper.shutdown().await;

    Ok(())
}
