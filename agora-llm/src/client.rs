//! LLM Client: unified interface for Ollama and OpenAI-compatible backends.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::service::DecisionService;
use crate::types::{ChatMessage, LlmRequest, LlmResponse};

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally (recommended).
    Ollama {
        /// e.g. `http://localhost:11434`.
        base_url: String,
    },
    /// OpenAI-compatible API.
    OpenAiCompatible {
        /// e.g. `https://api.openai.com`.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No LLM available; every call fails and callers use their defaults.
    None,
}

/// The main LLM client that routes requests to the configured backend.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
    timeout_ms: u64,
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32, timeout_ms: u64) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
            timeout_ms,
        }
    }

    /// Create a client with no LLM backend (all calls fail → rule-based fallback).
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), 0, 0)
    }

    /// Generate a response from the LLM.
    ///
    /// Returns `Err` if the LLM is unavailable or all retries fail.
    /// The caller should fall back to a default on error.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => {
                let url = format!("{base_url}/api/chat");
                let body = json!({
                    "model": self.model,
                    "messages": wire_messages(&request.messages()),
                    "stream": false,
                    "options": {
                        "temperature": request.temperature,
                        "num_predict": request.max_tokens,
                    }
                });
                self.post_with_retries(&url, None, &body, request.timeout_ms, |json| {
                    let text = json["message"]["content"].as_str().unwrap_or("").to_string();
                    let tokens = json["eval_count"].as_u64().unwrap_or(0);
                    (text, tokens)
                })
                .await
            }
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{base_url}/v1/chat/completions");
                let body = json!({
                    "model": self.model,
                    "messages": wire_messages(&request.messages()),
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                self.post_with_retries(&url, Some(api_key), &body, request.timeout_ms, |json| {
                    let text = json["choices"][0]["message"]["content"]
                        .as_str()
                        .unwrap_or("")
                        .to_string();
                    let tokens = json["usage"]["completion_tokens"].as_u64().unwrap_or(0);
                    (text, tokens)
                })
                .await
            }
        }
    }

    async fn post_with_retries(
        &self,
        url: &str,
        api_key: Option<&str>,
        body: &serde_json::Value,
        timeout_ms: u64,
        extract: impl Fn(&serde_json::Value) -> (String, u64),
    ) -> Result<LlmResponse, LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!("Retrying LLM call (attempt {}/{})", attempt + 1, self.max_retries + 1);
            }

            let start = Instant::now();
            let mut builder = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(timeout_ms));
            if let Some(key) = api_key {
                builder = builder.header("Authorization", format!("Bearer {key}"));
            }

            match builder.send().await {
                Ok(resp) if resp.status().is_success() => {
                    let json: serde_json::Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    let (text, tokens) = extract(&json);
                    return Ok(LlmResponse {
                        text,
                        tokens_generated: u32::try_from(tokens).unwrap_or(u32::MAX),
                        latency_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                        model: self.model.clone(),
                    });
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}: {}", resp.status(), resp.text().await.unwrap_or_default());
                    warn!("LLM backend returned error: {}", last_error);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() {
                        warn!("LLM request timed out after {}ms", timeout_ms);
                    } else {
                        warn!("LLM request failed: {}", last_error);
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    /// Check if the LLM client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }
}

fn wire_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| json!({ "role": m.role.wire_name(), "content": m.content }))
        .collect()
}

#[async_trait]
impl DecisionService for LlmClient {
    async fn submit(&self, history: &[ChatMessage], prompt: &str) -> Result<String, LlmError> {
        let request = LlmRequest::new(history.to_vec(), prompt).with_timeout(self.timeout_ms);
        let response = self.generate(&request).await?;
        debug!(model = %response.model, latency_ms = response.latency_ms, tokens = response.tokens_generated, "decision received");
        if response.text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(response.text)
    }

    fn is_available(&self) -> bool {
        LlmClient::is_available(self)
    }
}
