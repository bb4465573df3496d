//! Batched decision requests: the asynchronous half of a processor.
//!
//! ```text
//!  react / execute (sync)        resolve                      effect (sync)
//! ┌──────────────────────┐   ┌──────────────────────────┐   ┌─────────────────────────┐
//! │ snapshot entity names│──▶│ one request per name     │──▶│ re-fetch each entity by │
//! │ into the processor   │   │ join_all, each with its  │   │ name, apply the reply   │
//! └──────────────────────┘   │ own timeout              │   │ or the default          │
//!                            └──────────────────────────┘   └─────────────────────────┘
//! ```
//!
//! Requests own their inputs, so the future is `'static` and holds no
//! borrow of the world. A failure or timeout only affects its own entity.

use std::sync::Arc;
use std::time::{Duration, Instant};

use agora_core::{Continuation, Effect};
use agora_llm::{ChatMessage, DecisionService, LlmError, parse_structured};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::context::GameContext;

/// One outbound request, fully owned.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    /// Name of the entity the request is for.
    pub entity: String,
    /// Copy of the entity's history at request time.
    pub history: Vec<ChatMessage>,
    /// The instruction.
    pub prompt: String,
}

/// The outcome of one request.
#[derive(Debug)]
pub struct DecisionReply {
    /// Name of the entity the request was for.
    pub entity: String,
    /// The prompt that was sent.
    pub prompt: String,
    /// Raw text, or why there is none.
    pub outcome: Result<String, LlmError>,
}

impl DecisionReply {
    /// Parse the reply as `T`, logging and returning `None` on any failure.
    #[must_use]
    pub fn parse<T: DeserializeOwned>(&self) -> Option<T> {
        let text = match &self.outcome {
            Ok(text) => text,
            Err(e) => {
                warn!(entity = %self.entity, error = %e, "decision request failed; using default");
                return None;
            }
        };
        match parse_structured(text) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(entity = %self.entity, error = %e, "malformed decision; using default");
                None
            }
        }
    }

    /// The raw text, if the request succeeded and the text is not blank.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!(entity = %self.entity, "empty decision; using default");
                None
            }
            Err(e) => {
                warn!(entity = %self.entity, error = %e, "decision request failed; using default");
                None
            }
        }
    }
}

/// Send every request concurrently and wait for all of them. Replies come
/// back in request order.
pub async fn gather(
    service: Arc<dyn DecisionService>,
    requests: Vec<DecisionRequest>,
    timeout: Duration,
) -> Vec<DecisionReply> {
    let started = Instant::now();
    let count = requests.len();
    let replies = join_all(requests.into_iter().map(|request| {
        let service = Arc::clone(&service);
        async move {
            let outcome = match tokio::time::timeout(timeout, service.submit(&request.history, &request.prompt)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(LlmError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))),
            };
            DecisionReply {
                entity: request.entity,
                prompt: request.prompt,
                outcome,
            }
        }
    }))
    .await;
    debug!(count, elapsed_ms = started.elapsed().as_millis(), "decision batch joined");
    replies
}

/// Package a batch as a pipeline continuation: gather, then hand the replies
/// to `apply` on the control thread.
pub fn batch<F>(
    service: Arc<dyn DecisionService>,
    requests: Vec<DecisionRequest>,
    timeout: Duration,
    apply: F,
) -> Continuation<GameContext>
where
    F: FnOnce(&mut GameContext, Vec<DecisionReply>) -> agora_core::Result<()> + Send + 'static,
{
    Box::pin(async move {
        let replies = gather(service, requests, timeout).await;
        let effect: Effect<GameContext> = Box::new(move |ctx: &mut GameContext| apply(ctx, replies));
        effect
    })
}
