use agora_core::{Entity, Matcher, Processor, Trigger, WorldContext};
use tracing::{debug, warn};

use crate::components::{ArbitrationAction, PlayCardsAction};
use crate::context::GameContext;
use crate::events;

/// Records committed cards in their players' histories and hands the round
/// to the arbiter by marking the combat stage.
#[derive(Debug, Default)]
pub struct PlayCardsActionSystem;

impl Processor<GameContext> for PlayCardsActionSystem {
    fn name(&self) -> &'static str {
        "play-cards"
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(Matcher::new().all_of::<PlayCardsAction>()))
    }

    fn filter(&self, ctx: &GameContext, _entity: Entity) -> bool {
        ctx.combat().is_ongoing() && ctx.combat().latest_round().is_some_and(|r| !r.is_completed())
    }

    fn react(&mut self, ctx: &mut GameContext, entities: Vec<Entity>) -> agora_core::Result<()> {
        let round_number = ctx.combat().round_count();
        for entity in entities {
            let Some(card) = ctx.world().get::<PlayCardsAction>(entity).map(|a| a.card.clone()) else {
                continue;
            };
            let name = ctx.name_of(entity);
            debug!(actor = %name, card = %card.name, "card played");
            ctx.notify(&name, events::card_played(round_number, &card));
        }

        let Some(stage) = ctx.combat().current().map(|c| c.stage().to_string()) else {
            return Ok(());
        };
        match ctx.world().entity_by_name(&stage) {
            Some(stage) => ctx.world_mut().set(stage, ArbitrationAction)?,
            None => warn!(stage = %stage, "combat stage missing; round cannot be arbitrated"),
        }
        Ok(())
    }
}
