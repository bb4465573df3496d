//! The three simulation phases, as processor lists.
//!
//! Registration order is execution order within each tick role; see
//! [`agora_core::pipeline`] for the phase order.

use agora_core::{DestroyProcessor, Pipeline};

use crate::context::GameContext;
use crate::systems::{
    ActionCleanupSystem, AnnounceActionSystem, ArbitrationActionSystem, CombatInitializationSystem,
    CombatOutcomeSystem, CombatPostProcessingSystem, CombatRoundCreationSystem, DayVoteSystem,
    DrawCardsActionSystem, HomeActorPlanningSystem, KickOffSystem, KillResolutionSystem, NightKillSystem,
    PhaseClockSystem, PlayCardsActionSystem, SaveSystem, SocialOutcomeSystem, SpeakActionSystem,
    StatusEffectsSettlementSystem,
};

/// Pipeline name of the home phase.
pub const HOME: &str = "home";
/// Pipeline name of the dungeon phase.
pub const DUNGEON: &str = "dungeon";
/// Pipeline name of the social deduction phase.
pub const SOCIAL_DEDUCTION: &str = "social-deduction";

/// Free time at home.
#[must_use]
pub fn home_pipeline() -> Pipeline<GameContext> {
    Pipeline::new(HOME)
        .with(KickOffSystem::default())
        .with(HomeActorPlanningSystem::default())
        .with(SpeakActionSystem)
        .with(AnnounceActionSystem)
        .with(ActionCleanupSystem::default())
        .with(DestroyProcessor)
        .with(SaveSystem)
}

/// Card combat in a dungeon.
#[must_use]
pub fn dungeon_pipeline() -> Pipeline<GameContext> {
    Pipeline::new(DUNGEON)
        .with(KickOffSystem::default())
        .with(CombatInitializationSystem::default())
        .with(CombatRoundCreationSystem)
        .with(StatusEffectsSettlementSystem)
        .with(CombatOutcomeSystem)
        .with(CombatPostProcessingSystem::default())
        .with(DrawCardsActionSystem::default())
        .with(PlayCardsActionSystem)
        .with(ArbitrationActionSystem::default())
        .with(ActionCleanupSystem::default())
        .with(DestroyProcessor)
        .with(SaveSystem)
}

/// Werewolf-style social deduction.
#[must_use]
pub fn social_deduction_pipeline() -> Pipeline<GameContext> {
    Pipeline::new(SOCIAL_DEDUCTION)
        .with(SocialOutcomeSystem)
        .with(NightKillSystem::default())
        .with(DayVoteSystem::default())
        .with(KillResolutionSystem)
        .with(ActionCleanupSystem::default())
        .with(PhaseClockSystem)
        .with(DestroyProcessor)
        .with(SaveSystem)
}
