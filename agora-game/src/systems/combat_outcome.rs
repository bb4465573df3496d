use agora_core::{Component, Entity, Processor, World, WorldContext};
use tracing::{info, warn};

use crate::combat::{CombatResult, participants};
use crate::components::{AllyComponent, CombatStatsComponent, DeathComponent, EnemyComponent, is_alive, is_standing};
use crate::context::GameContext;
use crate::events;

fn side_standing<Side: Component>(world: &World, fighters: &[Entity]) -> bool {
    fighters
        .iter()
        .any(|&e| world.has::<Side>(e) && is_standing(world, e))
}

/// The result of the fight on `stage`, if one side has nobody standing.
/// A wiped-out ally side loses even if the enemies fell too.
#[must_use]
pub fn decide_outcome(world: &World, stage: &str) -> Option<CombatResult> {
    let fighters = participants(world, stage);
    if !side_standing::<AllyComponent>(world, &fighters) {
        Some(CombatResult::Lose)
    } else if !side_standing::<EnemyComponent>(world, &fighters) {
        Some(CombatResult::Win)
    } else {
        None
    }
}

/// Marks the fallen and closes the combat once a side is wiped out.
#[derive(Debug, Default)]
pub struct CombatOutcomeSystem;

impl Processor<GameContext> for CombatOutcomeSystem {
    fn name(&self) -> &'static str {
        "combat-outcome"
    }

    fn execute(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        if !ctx.combat().is_ongoing() {
            return Ok(());
        }
        let Some(combat) = ctx.combat().current() else {
            return Ok(());
        };
        let stage = combat.stage().to_string();
        let outcome_tag = combat.outcome_tag();

        let fighters = participants(ctx.world(), &stage);
        for &entity in &fighters {
            let fallen = is_alive(ctx.world(), entity)
                && ctx
                    .world()
                    .get::<CombatStatsComponent>(entity)
                    .is_some_and(|stats| stats.hp <= 0.0);
            if fallen {
                info!(actor = %ctx.name_of(entity), "fell in combat");
                ctx.world_mut().set(entity, DeathComponent)?;
            }
        }

        let Some(result) = decide_outcome(ctx.world(), &stage) else {
            return Ok(());
        };
        if let Err(e) = ctx.combat_mut().complete(result) {
            warn!(error = %e, "combat outcome ignored");
            return Ok(());
        }
        info!(stage = %stage, outcome = result.label(), "combat completed");

        let notice = events::combat_outcome(&stage, result);
        let allies: Vec<String> = fighters
            .into_iter()
            .filter(|&e| ctx.world().has::<AllyComponent>(e) && is_alive(ctx.world(), e))
            .map(|e| ctx.name_of(e))
            .collect();
        for ally in &allies {
            ctx.notify_tagged(ally, notice.as_str(), outcome_tag.as_str());
        }
        Ok(())
    }
}
