//! # agora-llm: decision requests for Agora agents
//!
//! Every outbound "ask an agent what it does" call goes through the
//! [`DecisionService`] trait. Two implementations ship here:
//!   - **[`LlmClient`]**: HTTP, Ollama (`/api/chat`) or any
//!     OpenAI-compatible endpoint (`/v1/chat/completions`), with retries.
//!     Provider `None` fails every call, which sends every caller down its
//!     rule-based fallback.
//!   - **[`ScriptedDecisions`]**: canned replies keyed by persona or prompt
//!     text, for offline runs and tests.
//!
//! Responses are free text. [`parse::parse_structured`] digs the JSON out
//! and deserializes it into one of the schemas in [`types`].
//!
//! ```text
//! processor ──history + prompt──▶ DecisionService ──text──▶ parse_structured::<T>
//!                                                                 │
//!                                   default on Err ◀──────────────┘
//! ```

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod service;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use parse::{extract_json, parse_structured};
pub use service::{DecisionService, ScriptedDecisions};
pub use types::{ChatMessage, LlmRequest, LlmResponse, Role};
