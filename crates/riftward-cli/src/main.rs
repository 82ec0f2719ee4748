//! Riftward turn runner.
//!
//! Plays one or more turns against a JSON state file and prints each turn
//! result as a JSON document on stdout. Logs go to stderr.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use riftward_core::clock::SystemClock;
use riftward_orchestrator::{OrchestratorConfig, TurnOrchestrator};
use tracing_subscriber::EnvFilter;

mod error;
mod store;

use error::CliError;
use store::JsonFileStateStore;

/// Run Riftward turns against a saved session.
#[derive(Debug, Parser)]
#[command(name = "riftward", version)]
struct Args {
    /// Id of the option to pick each turn. Unknown ids pick the first option.
    #[arg(long)]
    choice: Option<String>,

    /// Number of turns to play.
    #[arg(long, default_value_t = 1)]
    turns: u32,

    /// YAML file with orchestrator settings.
    #[arg(long, env = "RIFTWARD_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file holding the session state.
    #[arg(long, env = "RIFTWARD_STATE", default_value = "riftward_state.json")]
    state: PathBuf,

    /// Session seed; overrides the config file.
    #[arg(long, env = "RIFTWARD_SEED")]
    seed: Option<u64>,
}

fn load_config(args: &Args) -> Result<OrchestratorConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
                path: path.display().to_string(),
                source,
            })?;
            serde_yaml::from_str(&raw)?
        }
        None => OrchestratorConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    // No generator is wired into the binary.
    config.generation_enabled = false;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber. Stdout is reserved for turn results.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::info!(
        state = %args.state.display(),
        seed = config.seed,
        turns = args.turns,
        "Starting Riftward turn runner"
    );

    let store = Arc::new(JsonFileStateStore::new(&args.state));
    let mut orchestrator = TurnOrchestrator::new(config, store, Arc::new(SystemClock))
        .map_err(CliError::from)?;

    for _ in 0..args.turns {
        let result = orchestrator
            .run_turn(args.choice.as_deref())
            .await
            .map_err(CliError::from)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&result).map_err(CliError::from)?
        );
        if result.finalized {
            tracing::info!(status = ?result.win_loss.status, "game over");
            break;
        }
    }

    Ok(())
}
