//! Core types for decision requests and responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona and rules.
    System,
    /// Notifications and instructions addressed to the agent.
    Human,
    /// The agent's own replies.
    Ai,
}

impl Role {
    /// Role name in OpenAI / Ollama chat payloads.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Human => "user",
            Role::Ai => "assistant",
        }
    }
}

/// One message of an agent's running context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: Role,
    /// Opaque text.
    pub content: String,
    /// Optional marker used to find the message again (e.g. combat start).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tag: None }
    }

    /// A human message.
    #[must_use]
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: Role::Human, content: content.into(), tag: None }
    }

    /// An AI message.
    #[must_use]
    pub fn ai(content: impl Into<String>) -> Self {
        Self { role: Role::Ai, content: content.into(), tag: None }
    }

    /// Attach a tag.
    #[must_use]
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// A request to the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// Context history, oldest first.
    pub history: Vec<ChatMessage>,
    /// The new instruction.
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// Create a request with default sampling settings.
    #[must_use]
    pub fn new(history: Vec<ChatMessage>, prompt: impl Into<String>) -> Self {
        Self {
            history,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout_ms: 30_000,
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// History plus the prompt as a final human message.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = self.history.clone();
        messages.push(ChatMessage::human(self.prompt.clone()));
        messages
    }
}

/// A response from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}

// ---------------------------------------------------------------------------
// Structured response schemas
// ---------------------------------------------------------------------------

/// A card proposed by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    /// Card name.
    pub name: String,
    /// What the card does and what it costs the user.
    pub description: String,
    /// Target names. A single `target` string is accepted too.
    #[serde(default, alias = "target", deserialize_with = "one_or_many")]
    pub targets: Vec<String>,
}

/// A status effect proposed by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectDraft {
    /// Effect name.
    pub name: String,
    /// Cause and impact.
    pub description: String,
    /// Remaining rounds.
    pub duration: i32,
}

/// Opening status effects for one combatant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectsResponse {
    /// New effects.
    #[serde(default)]
    pub status_effects: Vec<StatusEffectDraft>,
}

/// One combatant's draw for the round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawCardsResponse {
    /// Current hp as read from the last round's log. Absent on round 1.
    #[serde(default)]
    pub update_hp: Option<f64>,
    /// Cards in hand.
    #[serde(default)]
    pub cards: Vec<CardDraft>,
    /// Self-inflicted status effects for this round.
    #[serde(default)]
    pub status_effects: Vec<StatusEffectDraft>,
}

/// Round resolution from the arbiter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationResponse {
    /// Terse, numeric log of what happened.
    pub combat_log: String,
    /// Prose account of the round.
    pub narrative: String,
    /// Final hp per combatant name, when the arbiter reports it.
    #[serde(default)]
    pub hp_updates: BTreeMap<String, f64>,
}

/// Free-time plan of an agent at home.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomePlanResponse {
    /// Lines addressed to specific listeners, keyed by listener name.
    #[serde(default)]
    pub speak: BTreeMap<String, String>,
    /// A line for everyone on the stage.
    #[serde(default)]
    pub announce: Option<String>,
}

/// A werewolf's proposed victim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NightKillResponse {
    /// Name of the proposed victim.
    pub target: String,
    /// Short justification.
    #[serde(default)]
    pub reason: String,
}

/// A villager's daytime speech and vote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayVoteResponse {
    /// What the player says to the table.
    #[serde(default)]
    pub speech: String,
    /// Who the player votes to eliminate. Absent means abstain.
    #[serde(default)]
    pub vote: Option<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(one) if one.is_empty() => Vec::new(),
        OneOrMany::One(one) => vec![one],
        OneOrMany::Many(many) => many,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_accepts_single_target() {
        let card: CardDraft = serde_json::from_str(
            r#"{"name":"Slash","description":"cut","target":"Goblin"}"#,
        )
        .unwrap();
        assert_eq!(card.targets, vec!["Goblin"]);

        let card: CardDraft = serde_json::from_str(
            r#"{"name":"Sweep","description":"cut all","targets":["A","B"]}"#,
        )
        .unwrap();
        assert_eq!(card.targets, vec!["A", "B"]);

        let card: CardDraft =
            serde_json::from_str(r#"{"name":"Brace","description":"hold"}"#).unwrap();
        assert!(card.targets.is_empty());
    }

    #[test]
    fn messages_append_prompt() {
        let request = LlmRequest::new(vec![ChatMessage::system("You are Kael.")], "Act.");
        let messages = request.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Human);
        assert_eq!(messages[1].content, "Act.");
        assert_eq!(Role::Ai.wire_name(), "assistant");
    }
}
