//! Host driver: owns the context and the active pipeline.
//!
//! ```text
//!   enter_home ─┐        ┌───────────────────────────────┐
//!   enter_dungeon ─┼──▶ shutdown old ─▶ activate new ─▶ initialize
//!   enter_social ─┘        └───────────────────────────────┘
//!                                       │
//!              queue_draw_cards / queue_play_cards ─▶ tick ─▶ tick ...
//! ```
//!
//! Exactly one pipeline is active at a time. Switching phases tears the old
//! one down first, so its group subscriptions are released before the new
//! pipeline subscribes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use agora_core::{Component, Entity, Pipeline, WorldContext};
use agora_llm::DecisionService;
use tracing::{info, warn};

use crate::combat::participants;
use crate::components::{
    ActorComponent, AllyComponent, DrawCardsAction, DungeonComponent, HandComponent, HomeComponent,
    PlayCardsAction, is_alive,
};
use crate::config::GameConfig;
use crate::context::{GameContext, SocialState};
use crate::error::{GameError, Result};
use crate::models::Card;
use crate::pipelines::{dungeon_pipeline, home_pipeline, social_deduction_pipeline};
use crate::savegame;
use crate::world_builder::{WorldSpec, assign_roles, build_world};

/// A running game.
#[derive(Debug)]
pub struct Game {
    ctx: GameContext,
    pipeline: Option<Pipeline<GameContext>>,
}

impl Game {
    /// A game with an empty world and no active pipeline.
    ///
    /// # Errors
    /// Propagates component registration failures.
    pub fn new(config: GameConfig, decisions: Arc<dyn DecisionService>) -> Result<Self> {
        Ok(Self {
            ctx: GameContext::new(config, decisions)?,
            pipeline: None,
        })
    }

    /// A game whose decision service is built from the `[llm]` section.
    ///
    /// # Errors
    /// [`GameError::Config`] for an unusable provider setup.
    pub fn from_config(config: GameConfig) -> Result<Self> {
        let client = config.llm.build_client()?;
        Self::new(config, Arc::new(client))
    }

    /// Restore a game saved with [`Game::save`]. No pipeline is active
    /// afterwards; enter a phase to continue.
    ///
    /// # Errors
    /// See [`savegame::load`].
    pub fn load(config: GameConfig, decisions: Arc<dyn DecisionService>, dir: &Path) -> Result<Self> {
        let mut game = Self::new(config, decisions)?;
        savegame::load(&mut game.ctx, dir)?;
        Ok(game)
    }

    /// The game context.
    #[must_use]
    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    /// The game context, mutably.
    pub fn context_mut(&mut self) -> &mut GameContext {
        &mut self.ctx
    }

    /// The active pipeline.
    #[must_use]
    pub fn pipeline(&self) -> Option<&Pipeline<GameContext>> {
        self.pipeline.as_ref()
    }

    /// Spawn the stages and actors of `spec`.
    ///
    /// # Errors
    /// See [`build_world`].
    pub fn build_world(&mut self, spec: &WorldSpec) -> Result<()> {
        build_world(&mut self.ctx, spec)
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    async fn switch(&mut self, mut next: Pipeline<GameContext>) -> Result<()> {
        self.shutdown()?;
        next.activate(&mut self.ctx)?;
        info!(pipeline = next.name(), "entering phase");
        let initialized = next.initialize(&mut self.ctx).await;
        self.pipeline = Some(next);
        initialized?;
        Ok(())
    }

    fn stage<Kind: Component>(&self, name: &str, kind: &'static str) -> Result<Entity> {
        let world = self.ctx.world();
        world
            .entity_by_name(name)
            .filter(|&e| world.has::<Kind>(e))
            .ok_or_else(|| GameError::Unknown {
                kind,
                name: name.to_string(),
            })
    }

    fn move_to(&mut self, actor: Entity, stage: &str) -> Result<()> {
        self.ctx.world_mut().set(
            actor,
            ActorComponent {
                stage: stage.to_string(),
            },
        )?;
        Ok(())
    }

    /// Bring every living ally to `home` and run the home pipeline.
    ///
    /// # Errors
    /// [`GameError::Unknown`] if `home` is not a home stage; pipeline
    /// activation failures.
    pub async fn enter_home(&mut self, home: &str) -> Result<()> {
        self.stage::<HomeComponent>(home, "home")?;
        let world = self.ctx.world();
        let allies: Vec<Entity> = world
            .entities()
            .filter(|&e| world.has::<AllyComponent>(e) && world.has::<ActorComponent>(e) && is_alive(world, e))
            .collect();
        for ally in allies {
            self.move_to(ally, home)?;
        }
        self.switch(home_pipeline()).await
    }

    /// Send `allies` into `dungeon`, announce a new combat there and run the
    /// dungeon pipeline. The combat is named `<dungeon>-<n>`.
    ///
    /// A combat that cannot start (one is still running) is logged; the
    /// pipeline is entered anyway.
    ///
    /// # Errors
    /// [`GameError::Unknown`] for an unknown dungeon or ally; pipeline
    /// activation failures.
    pub async fn enter_dungeon<S: AsRef<str>>(&mut self, dungeon: &str, allies: &[S]) -> Result<()> {
        self.stage::<DungeonComponent>(dungeon, "dungeon")?;
        let mut party = Vec::with_capacity(allies.len());
        for name in allies {
            let name = name.as_ref();
            let ally = self.ctx.world().entity_by_name(name).ok_or_else(|| GameError::Unknown {
                kind: "actor",
                name: name.to_string(),
            })?;
            party.push(ally);
        }
        for ally in party {
            self.move_to(ally, dungeon)?;
        }
        let combat = format!("{dungeon}-{}", self.ctx.combat().combats().len() + 1);
        if let Err(e) = self.ctx.combat_mut().start_combat(combat.as_str(), dungeon) {
            warn!(error = %e, "combat not started");
        }
        self.switch(dungeon_pipeline()).await
    }

    /// Seat `players` with fresh secret roles and run the social deduction
    /// pipeline from night 1.
    ///
    /// # Errors
    /// See [`assign_roles`]; pipeline activation failures.
    pub async fn enter_social_deduction<S: AsRef<str>>(&mut self, players: &[S]) -> Result<()> {
        assign_roles(&mut self.ctx, players)?;
        *self.ctx.social_mut() = SocialState::default();
        self.switch(social_deduction_pipeline()).await
    }

    /// Run one tick of the active pipeline.
    ///
    /// # Errors
    /// A structural error from the tick.
    pub async fn tick(&mut self) -> Result<()> {
        match self.pipeline.as_mut() {
            Some(pipeline) => Ok(pipeline.process_tick(&mut self.ctx).await?),
            None => {
                warn!("tick without an active pipeline ignored");
                Ok(())
            }
        }
    }

    /// Shut the active pipeline down, releasing its subscriptions.
    ///
    /// # Errors
    /// The first teardown error. The pipeline is dropped either way.
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.shutdown(&mut self.ctx)?;
        }
        Ok(())
    }

    /// Write the game into `dir`.
    ///
    /// # Errors
    /// See [`savegame::save`].
    pub fn save(&self, dir: &Path) -> Result<()> {
        savegame::save(&self.ctx, dir)
    }

    // -----------------------------------------------------------------------
    // Host hooks
    // -----------------------------------------------------------------------

    fn round_fighters(&self) -> Vec<Entity> {
        let combat = self.ctx.combat();
        match combat.latest_round() {
            Some(round) if combat.is_ongoing() && !round.is_completed() => round.living_order(self.ctx.world()),
            _ => Vec::new(),
        }
    }

    /// Ask every living fighter of the open round to draw cards on the next
    /// tick. Returns how many were queued; zero outside an open round.
    ///
    /// # Errors
    /// Propagates a structural world error.
    pub fn queue_draw_cards(&mut self) -> Result<usize> {
        let fighters = self.round_fighters();
        for &fighter in &fighters {
            self.ctx.world_mut().set(fighter, DrawCardsAction)?;
        }
        Ok(fighters.len())
    }

    /// Commit one card per living fighter holding a hand: the card named in
    /// `choices` if it is in the hand, else the first card, else `Wait`.
    /// Returns how many cards were committed.
    ///
    /// # Errors
    /// Propagates a structural world error.
    pub fn queue_play_cards(&mut self, choices: &BTreeMap<String, String>) -> Result<usize> {
        let mut committed = 0;
        for fighter in self.round_fighters() {
            let Some(hand) = self.ctx.world().get::<HandComponent>(fighter) else {
                continue;
            };
            let name = self.ctx.name_of(fighter);
            let chosen = choices
                .get(&name)
                .and_then(|wanted| hand.cards.iter().find(|c| &c.name == wanted))
                .or_else(|| hand.cards.first())
                .cloned()
                .unwrap_or_else(|| Card::wait(&name));
            self.ctx.world_mut().set(fighter, PlayCardsAction { card: chosen })?;
            committed += 1;
        }
        Ok(committed)
    }

    /// Living participants of the current combat, by name.
    #[must_use]
    pub fn combatants(&self) -> Vec<String> {
        let Some(combat) = self.ctx.combat().current() else {
            return Vec::new();
        };
        let world = self.ctx.world();
        participants(world, combat.stage())
            .into_iter()
            .filter(|&e| is_alive(world, e))
            .map(|e| self.ctx.name_of(e))
            .collect()
    }
}
