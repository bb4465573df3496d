use agora_core::{Processor, WorldContext};
use tracing::{debug, warn};

use crate::combat::{participants, settle_status_effects};
use crate::components::CombatStatsComponent;
use crate::context::GameContext;
use crate::events;

/// Ages status effects by one round at every round boundary after the first.
///
/// The settled mark lives on the round itself, so a boundary is settled
/// exactly once however many ticks, pipeline switches or reloads it spans.
#[derive(Debug, Default)]
pub struct StatusEffectsSettlementSystem;

impl Processor<GameContext> for StatusEffectsSettlementSystem {
    fn name(&self) -> &'static str {
        "status-effects-settlement"
    }

    fn execute(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        let combat = ctx.combat();
        if !combat.is_ongoing() || combat.round_count() < 2 {
            return Ok(());
        }
        let Some(stage) = combat.current().map(|c| c.stage().to_string()) else {
            return Ok(());
        };
        match ctx.combat_mut().settle_latest_round() {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(err) => {
                warn!(error = %err, "cannot settle round");
                return Ok(());
            }
        }

        for entity in participants(ctx.world(), &stage) {
            let name = ctx.name_of(entity);
            let Some(stats) = ctx.world_mut().get_mut::<CombatStatsComponent>(entity) else {
                continue;
            };
            let expired = settle_status_effects(&mut stats.status_effects);
            if expired.is_empty() {
                continue;
            }
            debug!(actor = %name, expired = expired.len(), "status effects expired");
            ctx.notify(&name, events::status_effects_expired(&expired));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatusEffect;
    use crate::testing::{dungeon_context, ongoing_combat, spawn_fighter};

    #[test]
    fn settles_once_per_round_and_never_on_the_first() {
        let mut ctx = dungeon_context();
        let kael = spawn_fighter(&mut ctx, "Kael", true, 30.0);
        ctx.world_mut()
            .get_mut::<CombatStatsComponent>(kael)
            .unwrap()
            .status_effects = vec![
            StatusEffect::new("Burning", "flames", 1),
            StatusEffect::new("Focused", "calm", 3),
        ];
        ongoing_combat(&mut ctx, "c1");
        let before = ctx.history("Kael").unwrap().len();

        let mut system = StatusEffectsSettlementSystem;
        ctx.combat_mut().create_round(vec!["Kael".into()]).unwrap();
        system.execute(&mut ctx).unwrap();
        assert_eq!(ctx.world().get::<CombatStatsComponent>(kael).unwrap().status_effects.len(), 2);

        ctx.combat_mut().complete_round(String::new(), String::new()).unwrap();
        ctx.combat_mut().create_round(vec!["Kael".into()]).unwrap();
        system.execute(&mut ctx).unwrap();
        system.execute(&mut ctx).unwrap();

        let effects = &ctx.world().get::<CombatStatsComponent>(kael).unwrap().status_effects;
        assert_eq!(effects, &vec![StatusEffect::new("Focused", "calm", 2)]);
        let history = ctx.history("Kael").unwrap();
        assert_eq!(history.len(), before + 1);
        assert!(history.last().unwrap().content.contains("- Burning: flames"));
    }

    #[test]
    fn a_rebuilt_system_does_not_settle_the_same_round_again() {
        let mut ctx = dungeon_context();
        let kael = spawn_fighter(&mut ctx, "Kael", true, 30.0);
        ctx.world_mut()
            .get_mut::<CombatStatsComponent>(kael)
            .unwrap()
            .status_effects = vec![StatusEffect::new("Focused", "calm", 3)];
        ongoing_combat(&mut ctx, "c1");
        ctx.combat_mut().create_round(vec!["Kael".into()]).unwrap();
        ctx.combat_mut().complete_round(String::new(), String::new()).unwrap();
        ctx.combat_mut().create_round(vec!["Kael".into()]).unwrap();

        StatusEffectsSettlementSystem.execute(&mut ctx).unwrap();
        StatusEffectsSettlementSystem.execute(&mut ctx).unwrap();

        let effects = &ctx.world().get::<CombatStatsComponent>(kael).unwrap().status_effects;
        assert_eq!(effects, &vec![StatusEffect::new("Focused", "calm", 2)]);
        assert!(ctx.combat().latest_round().unwrap().is_settled());
    }
}
