//! Riftward CLI — startup and runtime errors.

use riftward_core::error::EngineError;
use thiserror::Error;

/// Everything that can stop the turn runner.
#[derive(Debug, Error)]
pub enum CliError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    /// The config file is not valid YAML for `OrchestratorConfig`.
    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A turn result could not be rendered.
    #[error("cannot render turn result: {0}")]
    Render(#[from] serde_json::Error),

    /// The engine aborted a turn.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
