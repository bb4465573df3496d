use agora_core::{Processor, WorldContext};
use tracing::{info, warn};

use crate::combat::{CombatError, action_order};
use crate::context::GameContext;

use super::decide_outcome;

/// Open a round on the current combat with a freshly drawn action order.
/// Returns the new round's tag.
///
/// # Errors
/// Any [`CombatError`] from [`CombatSequence::create_round`](crate::combat::CombatSequence::create_round).
pub fn open_round(ctx: &mut GameContext) -> Result<String, CombatError> {
    let stage = ctx
        .combat()
        .current()
        .ok_or(CombatError::NoCombat)?
        .stage()
        .to_string();
    let strategy = ctx.config().combat.action_order;
    let (world, rng) = ctx.world_and_rng();
    let order = action_order(world, &stage, strategy, rng);
    let round = ctx.combat_mut().create_round(order)?;
    info!(round = round.tag(), order = ?round.action_order(), "round opened");
    Ok(round.tag().to_string())
}

/// Opens the next round whenever the previous one is resolved and both
/// sides still stand.
#[derive(Debug, Default)]
pub struct CombatRoundCreationSystem;

impl Processor<GameContext> for CombatRoundCreationSystem {
    fn name(&self) -> &'static str {
        "combat-round-creation"
    }

    fn execute(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        let combat = ctx.combat();
        if !combat.is_ongoing() || combat.latest_round().is_some_and(|r| !r.is_completed()) {
            return Ok(());
        }
        let Some(stage) = combat.current().map(|c| c.stage().to_string()) else {
            return Ok(());
        };
        // A decided fight is left to the outcome system.
        if decide_outcome(ctx.world(), &stage).is_some() {
            return Ok(());
        }
        if let Err(e) = open_round(ctx) {
            warn!(error = %e, "round creation skipped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::CombatStatsComponent;
    use crate::testing::{dungeon_context, ongoing_combat, spawn_fighter};

    #[test]
    fn opens_round_only_when_previous_is_done() {
        let mut ctx = dungeon_context();
        spawn_fighter(&mut ctx, "Kael", true, 30.0);
        spawn_fighter(&mut ctx, "Goblin", false, 10.0);
        ongoing_combat(&mut ctx, "c1");

        let mut system = CombatRoundCreationSystem;
        system.execute(&mut ctx).unwrap();
        system.execute(&mut ctx).unwrap();
        assert_eq!(ctx.combat().round_count(), 1);
        assert_eq!(ctx.combat().latest_round().unwrap().tag(), "c1-round-1");

        ctx.combat_mut().complete_round(String::new(), String::new()).unwrap();
        system.execute(&mut ctx).unwrap();
        assert_eq!(ctx.combat().round_count(), 2);
    }

    #[test]
    fn decided_fight_gets_no_round() {
        let mut ctx = dungeon_context();
        spawn_fighter(&mut ctx, "Kael", true, 30.0);
        spawn_fighter(&mut ctx, "Goblin", false, 0.0);
        ongoing_combat(&mut ctx, "c1");

        CombatRoundCreationSystem.execute(&mut ctx).unwrap();
        assert_eq!(ctx.combat().round_count(), 0);
    }

    #[test]
    fn knocked_down_fighter_is_left_out_of_the_next_round() {
        let mut ctx = dungeon_context();
        spawn_fighter(&mut ctx, "Kael", true, 30.0);
        spawn_fighter(&mut ctx, "Goblin", false, 10.0);
        spawn_fighter(&mut ctx, "Orc", false, 10.0);
        ongoing_combat(&mut ctx, "c1");
        CombatRoundCreationSystem.execute(&mut ctx).unwrap();
        assert_eq!(ctx.combat().latest_round().unwrap().action_order(), ["Kael", "Goblin", "Orc"]);

        let orc = ctx.world().entity_by_name("Orc").unwrap();
        ctx.world_mut().get_mut::<CombatStatsComponent>(orc).unwrap().hp = 0.0;
        ctx.combat_mut().complete_round(String::new(), String::new()).unwrap();
        CombatRoundCreationSystem.execute(&mut ctx).unwrap();

        let round = ctx.combat().latest_round().unwrap();
        assert_eq!(round.tag(), "c1-round-2");
        assert_eq!(round.action_order(), ["Kael", "Goblin"]);
    }
}
