//! The game context every processor receives.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use agora_core::{Entity, World, WorldContext};
use agora_llm::{ChatMessage, DecisionService};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::combat::CombatSequence;
use crate::components::{ActorComponent, register_components};
use crate::config::GameConfig;
use crate::decision::DecisionRequest;
use crate::error::Result;
use crate::history::AgentHistory;
use crate::models::{SocialFaction, SocialPhase};

/// Social deduction bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialState {
    /// Current phase.
    pub phase: SocialPhase,
    /// Set once a side has won.
    pub winner: Option<SocialFaction>,
}

impl Default for SocialState {
    fn default() -> Self {
        Self {
            phase: SocialPhase::Night(1),
            winner: None,
        }
    }
}

/// World, agent histories, combat state and collaborators, passed by
/// `&mut` into every processor call.
pub struct GameContext {
    world: World,
    histories: BTreeMap<String, AgentHistory>,
    combat: CombatSequence,
    social: SocialState,
    decisions: Arc<dyn DecisionService>,
    rng: StdRng,
    config: GameConfig,
}

impl GameContext {
    /// A fresh context with every game component registered.
    ///
    /// # Errors
    /// Propagates a component registration clash.
    pub fn new(config: GameConfig, decisions: Arc<dyn DecisionService>) -> Result<Self> {
        let mut world = World::new();
        register_components(&mut world)?;
        let rng = match config.general.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            world,
            histories: BTreeMap::new(),
            combat: CombatSequence::new(),
            social: SocialState::default(),
            decisions,
            rng,
            config,
        })
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Combat state machine.
    #[must_use]
    pub fn combat(&self) -> &CombatSequence {
        &self.combat
    }

    /// Combat state machine, mutably.
    pub fn combat_mut(&mut self) -> &mut CombatSequence {
        &mut self.combat
    }

    /// Social deduction state.
    #[must_use]
    pub fn social(&self) -> &SocialState {
        &self.social
    }

    /// Social deduction state, mutably.
    pub fn social_mut(&mut self) -> &mut SocialState {
        &mut self.social
    }

    /// Shared handle to the decision service.
    #[must_use]
    pub fn decisions(&self) -> Arc<dyn DecisionService> {
        Arc::clone(&self.decisions)
    }

    /// Random source for shuffles and picks.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// World and random source at once, for orderings drawn from the world.
    pub fn world_and_rng(&mut self) -> (&World, &mut StdRng) {
        (&self.world, &mut self.rng)
    }

    // -----------------------------------------------------------------------
    // Histories
    // -----------------------------------------------------------------------

    /// History of `name`.
    #[must_use]
    pub fn history(&self, name: &str) -> Option<&AgentHistory> {
        self.histories.get(name)
    }

    /// History of `name`, created empty if missing.
    pub fn history_mut(&mut self, name: &str) -> &mut AgentHistory {
        self.histories.entry(name.to_string()).or_default()
    }

    /// All histories by agent name.
    #[must_use]
    pub fn histories(&self) -> &BTreeMap<String, AgentHistory> {
        &self.histories
    }

    /// Replace every history, e.g. after loading a save.
    pub fn set_histories(&mut self, histories: BTreeMap<String, AgentHistory>) {
        self.histories = histories;
    }

    /// Start `name`'s history with a persona.
    pub fn set_persona(&mut self, name: &str, persona: impl Into<String>) {
        self.histories
            .insert(name.to_string(), AgentHistory::with_persona(persona));
    }

    /// Append a notification to `name`'s history.
    pub fn notify(&mut self, name: &str, text: impl Into<String>) {
        self.history_mut(name).push(ChatMessage::human(text));
    }

    /// Append a tagged notification to `name`'s history.
    pub fn notify_tagged(&mut self, name: &str, text: impl Into<String>, tag: impl Into<String>) {
        self.history_mut(name).push(ChatMessage::human(text).tagged(tag));
    }

    /// Append the same notification to several histories.
    pub fn broadcast<S: AsRef<str>>(&mut self, names: &[S], text: &str) {
        for name in names {
            self.notify(name.as_ref(), text);
        }
    }

    /// Record a request and its reply in `name`'s history.
    pub fn record_exchange(&mut self, name: &str, prompt: &str, reply: &str) {
        let history = self.history_mut(name);
        history.push(ChatMessage::human(prompt));
        history.push(ChatMessage::ai(reply));
    }

    /// Build a request for `name`: a copy of its history plus `prompt`.
    #[must_use]
    pub fn request_for(&self, name: &str, prompt: String) -> DecisionRequest {
        DecisionRequest {
            entity: name.to_string(),
            history: self
                .histories
                .get(name)
                .map(|h| h.messages().to_vec())
                .unwrap_or_default(),
            prompt,
        }
    }

    // -----------------------------------------------------------------------
    // Stage helpers
    // -----------------------------------------------------------------------

    /// The stage entity `actor` is on.
    #[must_use]
    pub fn stage_of(&self, actor: Entity) -> Option<Entity> {
        let stage = &self.world.get::<ActorComponent>(actor)?.stage;
        let found = self.world.entity_by_name(stage);
        if found.is_none() {
            warn!(%actor, stage = %stage, "actor references a missing stage");
        }
        found
    }

    /// Actors on the stage named `stage`, in creation order.
    #[must_use]
    pub fn actors_on(&self, stage: &str) -> Vec<Entity> {
        self.world
            .entities()
            .filter(|&e| self.world.get::<ActorComponent>(e).is_some_and(|a| a.stage == stage))
            .collect()
    }

    /// Display name of `entity`, or an empty string.
    #[must_use]
    pub fn name_of(&self, entity: Entity) -> String {
        self.world.name(entity).unwrap_or_default().to_string()
    }
}

impl WorldContext for GameContext {
    fn world(&self) -> &World {
        &self.world
    }

    fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl fmt::Debug for GameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameContext")
            .field("world", &self.world)
            .field("histories", &self.histories.len())
            .field("combat", &self.combat.state())
            .field("social", &self.social)
            .field("decisions_available", &self.decisions.is_available())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_llm::ScriptedDecisions;

    fn context() -> GameContext {
        GameContext::new(GameConfig::default(), Arc::new(ScriptedDecisions::new())).unwrap()
    }

    #[test]
    fn request_copies_history() {
        let mut ctx = context();
        ctx.set_persona("Kael", "You are Kael.");
        ctx.notify("Kael", "A goblin appears.");
        let request = ctx.request_for("Kael", "Act.".into());
        assert_eq!(request.history.len(), 2);
        ctx.notify("Kael", "later");
        assert_eq!(request.history.len(), 2);
        assert!(ctx.request_for("Nobody", "Act.".into()).history.is_empty());
    }

    #[test]
    fn stage_lookup() {
        let mut ctx = context();
        let stage = ctx.world_mut().create("Square").unwrap();
        let actor = ctx.world_mut().create("Kael").unwrap();
        ctx.world_mut().set(actor, ActorComponent { stage: "Square".into() }).unwrap();
        let lost = ctx.world_mut().create("Lost").unwrap();
        ctx.world_mut().set(lost, ActorComponent { stage: "Nowhere".into() }).unwrap();

        assert_eq!(ctx.stage_of(actor), Some(stage));
        assert_eq!(ctx.stage_of(lost), None);
        assert_eq!(ctx.actors_on("Square"), vec![actor]);
    }
}
