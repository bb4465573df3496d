//! The decision-service seam and an offline, scripted implementation.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::LlmError;
use crate::types::{ChatMessage, Role};

/// Anything that can turn a context history plus a prompt into text.
///
/// Retry policy, if any, belongs to the implementation. Callers treat every
/// error as "use the default for this one entity".
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Submit one request.
    async fn submit(&self, history: &[ChatMessage], prompt: &str) -> Result<String, LlmError>;

    /// Whether calls can succeed at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// A decision service that answers from a script. Useful offline and in
/// tests.
///
/// Each rule matches on a needle found in the agent's persona (its first
/// system message) or in the prompt. The first matching rule answers:
/// queued one-shot replies first, then its repeating reply. Unmatched
/// requests fail with [`LlmError::Unavailable`].
#[derive(Default)]
pub struct ScriptedDecisions {
    rules: Mutex<Vec<Rule>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

struct Rule {
    needle: String,
    queued: VecDeque<Result<String, String>>,
    repeat: Option<Result<String, String>>,
}

impl ScriptedDecisions {
    /// An empty script: every request fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(&mut self, needle: &str) -> &mut Rule {
        let rules = self.rules.get_mut();
        let index = match rules.iter().position(|r| r.needle == needle) {
            Some(index) => index,
            None => {
                rules.push(Rule {
                    needle: needle.to_string(),
                    queued: VecDeque::new(),
                    repeat: None,
                });
                rules.len() - 1
            }
        };
        &mut rules[index]
    }

    /// Always answer `reply` when `needle` matches.
    #[must_use]
    pub fn on(mut self, needle: &str, reply: impl Into<String>) -> Self {
        self.rule(needle).repeat = Some(Ok(reply.into()));
        self
    }

    /// Answer `reply` once when `needle` matches.
    #[must_use]
    pub fn once(mut self, needle: &str, reply: impl Into<String>) -> Self {
        self.rule(needle).queued.push_back(Ok(reply.into()));
        self
    }

    /// Fail every request `needle` matches.
    #[must_use]
    pub fn fail_on(mut self, needle: &str) -> Self {
        self.rule(needle).repeat = Some(Err(format!("scripted failure for '{needle}'")));
        self
    }

    /// Delay every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far, in arrival order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn answer(&self, history: &[ChatMessage], prompt: &str) -> Result<String, LlmError> {
        let persona = history
            .iter()
            .find(|m| m.role == Role::System)
            .map_or("", |m| m.content.as_str());
        let mut rules = self.rules.lock();
        let rule = rules
            .iter_mut()
            .find(|r| persona.contains(&r.needle) || prompt.contains(&r.needle))
            .ok_or_else(|| LlmError::Unavailable("no scripted reply".into()))?;
        debug!(needle = %rule.needle, "scripted reply");
        let reply = rule
            .queued
            .pop_front()
            .or_else(|| rule.repeat.clone())
            .ok_or_else(|| LlmError::Unavailable(format!("script for '{}' exhausted", rule.needle)))?;
        reply.map_err(LlmError::RequestFailed)
    }
}

#[async_trait]
impl DecisionService for ScriptedDecisions {
    async fn submit(&self, history: &[ChatMessage], prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer(history, prompt)
    }
}
