//! Processors of the three pipelines.
//!
//! | Processor                         | Roles                       | Pipelines        |
//! |-----------------------------------|-----------------------------|------------------|
//! | [`KickOffSystem`]                 | initialize, reactive, async | home, dungeon    |
//! | [`HomeActorPlanningSystem`]       | execute, async              | home             |
//! | [`SpeakActionSystem`]             | reactive                    | home             |
//! | [`AnnounceActionSystem`]          | reactive                    | home             |
//! | [`CombatInitializationSystem`]    | execute, async              | dungeon          |
//! | [`CombatRoundCreationSystem`]     | execute                     | dungeon          |
//! | [`StatusEffectsSettlementSystem`] | execute                     | dungeon          |
//! | [`CombatOutcomeSystem`]           | execute                     | dungeon          |
//! | [`CombatPostProcessingSystem`]    | execute, async              | dungeon          |
//! | [`DrawCardsActionSystem`]         | reactive, async             | dungeon          |
//! | [`PlayCardsActionSystem`]         | reactive                    | dungeon          |
//! | [`ArbitrationActionSystem`]       | reactive, async             | dungeon          |
//! | [`SocialOutcomeSystem`]           | execute                     | social deduction |
//! | [`NightKillSystem`]               | execute, async              | social deduction |
//! | [`DayVoteSystem`]                 | execute, async              | social deduction |
//! | [`KillResolutionSystem`]          | reactive                    | social deduction |
//! | [`PhaseClockSystem`]              | cleanup                     | social deduction |
//! | [`ActionCleanupSystem`]           | cleanup                     | all              |
//! | [`SaveSystem`]                    | cleanup                     | all              |

mod action_cleanup;
mod arbitration;
mod combat_init;
mod combat_outcome;
mod draw_cards;
mod home;
mod kick_off;
mod play_cards;
mod post_combat;
mod round_creation;
mod save;
mod social;
mod status_settlement;

pub use action_cleanup::ActionCleanupSystem;
pub use arbitration::ArbitrationActionSystem;
pub use combat_init::CombatInitializationSystem;
pub use combat_outcome::{CombatOutcomeSystem, decide_outcome};
pub use draw_cards::DrawCardsActionSystem;
pub use home::{AnnounceActionSystem, HomeActorPlanningSystem, SpeakActionSystem};
pub use kick_off::KickOffSystem;
pub use play_cards::PlayCardsActionSystem;
pub use post_combat::CombatPostProcessingSystem;
pub use round_creation::{CombatRoundCreationSystem, open_round};
pub use save::SaveSystem;
pub use social::{DayVoteSystem, KillResolutionSystem, NightKillSystem, PhaseClockSystem, SocialOutcomeSystem};
pub use status_settlement::StatusEffectsSettlementSystem;

use agora_core::{Entity, WorldContext};

use crate::context::GameContext;

/// Append the names of `entities` to `pending`, skipping unknown entities
/// and names already queued.
fn queue_names(ctx: &GameContext, pending: &mut Vec<String>, entities: impl IntoIterator<Item = Entity>) {
    for entity in entities {
        let Some(name) = ctx.world().name(entity) else {
            debug_assert!(false, "queued a dead entity handle");
            continue;
        };
        if !pending.iter().any(|p| p == name) {
            pending.push(name.to_string());
        }
    }
}
