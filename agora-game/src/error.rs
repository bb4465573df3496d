//! Game-layer error types.

use agora_core::EcsError;
use agora_llm::LlmError;
use thiserror::Error;

use crate::combat::CombatError;

/// Errors surfaced by the game layer and its host driver.
#[derive(Debug, Error)]
pub enum GameError {
    /// Entity store, group or pipeline failure.
    #[error("ECS error: {0}")]
    Ecs(#[from] EcsError),

    /// Decision service failure outside of a per-entity batch.
    #[error("decision error: {0}")]
    Llm(#[from] LlmError),

    /// Invalid combat state transition.
    #[error("combat error: {0}")]
    Combat(#[from] CombatError),

    /// Configuration could not be parsed or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A world factory was asked for something that does not exist.
    #[error("unknown {kind}: '{name}'")]
    Unknown {
        /// What was looked up (stage, actor, ...).
        kind: &'static str,
        /// The name that was not found.
        name: String,
    },

    /// Save-file serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for the game layer.
pub type Result<T> = std::result::Result<T, GameError>;
