//! Plain data carried inside components.

use agora_llm::types::{CardDraft, StatusEffectDraft};
use serde::{Deserialize, Serialize};

/// A timed condition on a combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Effect name.
    pub name: String,
    /// Cause and impact.
    pub description: String,
    /// Remaining rounds.
    pub duration: i32,
}

impl StatusEffect {
    /// Create an effect.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, duration: i32) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            duration,
        }
    }
}

impl From<StatusEffectDraft> for StatusEffect {
    fn from(draft: StatusEffectDraft) -> Self {
        Self::new(draft.name, draft.description, draft.duration)
    }
}

/// An action a combatant may play this round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Card name.
    pub name: String,
    /// Effect on the targets and cost to the user.
    pub description: String,
    /// Target names.
    pub targets: Vec<String>,
}

impl Card {
    /// The conservative default: do nothing this round.
    #[must_use]
    pub fn wait(actor: &str) -> Self {
        Self {
            name: "Wait".to_string(),
            description: "Hold position and watch for an opening. No effect, no cost.".to_string(),
            targets: vec![actor.to_string()],
        }
    }

    /// Targets joined for display, or "nobody".
    #[must_use]
    pub fn target_list(&self) -> String {
        if self.targets.is_empty() {
            "nobody".to_string()
        } else {
            self.targets.join(", ")
        }
    }
}

impl From<CardDraft> for Card {
    fn from(draft: CardDraft) -> Self {
        Self {
            name: draft.name,
            description: draft.description,
            targets: draft.targets,
        }
    }
}

/// Side of a finished social deduction game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocialFaction {
    /// The werewolves.
    Werewolves,
    /// Everyone else.
    Villagers,
}

impl SocialFaction {
    /// Plural display name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Werewolves => "werewolves",
            Self::Villagers => "villagers",
        }
    }
}

/// Night or day of the social deduction clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocialPhase {
    /// Werewolves pick a victim.
    Night(u32),
    /// Everyone speaks and votes.
    Day(u32),
}

impl SocialPhase {
    /// The phase after this one: night N is followed by day N, day N by
    /// night N + 1.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Night(n) => Self::Day(n),
            Self::Day(n) => Self::Night(n + 1),
        }
    }
}
