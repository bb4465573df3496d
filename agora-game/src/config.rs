//! Configuration for an Agora game, loadable from `agora.toml`.
//!
//! Every section and every field has a default, so an empty file (or no
//! file at all) yields a playable offline configuration.
//!
//! ```toml
//! [general]
//! log_level = "debug"
//! seed = 7
//!
//! [llm]
//! provider = "ollama"
//! model = "qwen2.5:7b"
//!
//! [combat]
//! cards_per_draw = 3
//! action_order = "creation_order"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use agora_llm::{LlmClient, LlmProvider};
use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Top-level game configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Decision backend settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Combat tuning.
    #[serde(default)]
    pub combat: CombatConfig,
    /// Social deduction tuning.
    #[serde(default)]
    pub social: SocialConfig,
    /// Save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl GameConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `GameError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| GameError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seed for shuffles and random picks. Unset means seeded from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            seed: None,
        }
    }
}

/// Decision backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL for the LLM API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Bearer token for OpenAI-compatible providers.
    #[serde(default)]
    pub api_key: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Max retries before the caller falls back to its default.
    #[serde(default = "default_2")]
    pub max_retries: u32,
    /// Per-attempt HTTP timeout in milliseconds.
    #[serde(default = "default_30000")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_ollama_url(),
            api_key: String::new(),
            model: default_model(),
            max_retries: 2,
            timeout_ms: 30_000,
        }
    }
}

impl LlmConfig {
    /// Build the HTTP client this section describes.
    ///
    /// # Errors
    /// Returns `GameError::Config` for an unknown provider or an OpenAI
    /// provider without an API key.
    pub fn build_client(&self) -> Result<LlmClient> {
        let provider = match self.provider.as_str() {
            "ollama" => LlmProvider::Ollama {
                base_url: self.base_url.clone(),
            },
            "openai" => {
                if self.api_key.is_empty() {
                    return Err(GameError::Config("llm.api_key is required for provider 'openai'".into()));
                }
                LlmProvider::OpenAiCompatible {
                    base_url: self.base_url.clone(),
                    api_key: self.api_key.clone(),
                }
            }
            "none" => return Ok(LlmClient::none()),
            other => return Err(GameError::Config(format!("unknown llm provider: '{other}'"))),
        };
        Ok(LlmClient::new(provider, self.model.clone(), self.max_retries, self.timeout_ms))
    }
}

/// How a round's action order is derived from the living participants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOrderStrategy {
    /// Uniform shuffle, drawn fresh for every round.
    #[default]
    Random,
    /// Entity creation order. Deterministic, for tests and replays.
    CreationOrder,
}

/// Combat tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Cards each combatant draws per round.
    #[serde(default = "default_2_usize")]
    pub cards_per_draw: usize,
    /// Action order strategy.
    #[serde(default)]
    pub action_order: ActionOrderStrategy,
    /// Upper bound on any single decision request, in milliseconds.
    #[serde(default = "default_60000")]
    pub request_timeout_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            cards_per_draw: 2,
            action_order: ActionOrderStrategy::Random,
            request_timeout_ms: 60_000,
        }
    }
}

impl CombatConfig {
    /// `request_timeout_ms` as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Social deduction tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Number of werewolves dealt at role assignment.
    #[serde(default = "default_2_usize")]
    pub werewolf_count: usize,
    /// Whether a seer is dealt.
    #[serde(default = "default_true")]
    pub with_seer: bool,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            werewolf_count: 2,
            with_seer: true,
        }
    }
}

/// Save settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory the save processor writes into. Unset disables saving.
    #[serde(default)]
    pub save_dir: Option<PathBuf>,
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_provider() -> String { "none".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "qwen2.5:7b".to_string() }
fn default_2() -> u32 { 2 }
fn default_2_usize() -> usize { 2 }
fn default_30000() -> u64 { 30_000 }
fn default_60000() -> u64 { 60_000 }
