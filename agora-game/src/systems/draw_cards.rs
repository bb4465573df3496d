use std::mem;

use agora_core::{Continuation, Entity, Matcher, Processor, Trigger, WorldContext};
use agora_llm::prompt::{DRAW_CARDS_FIRST_ROUND, DRAW_CARDS_LATER_ROUND, render_template};
use agora_llm::types::DrawCardsResponse;
use tracing::{debug, warn};

use crate::components::{CombatStatsComponent, DrawCardsAction, HandComponent, is_alive};
use crate::context::GameContext;
use crate::decision::{self, DecisionReply};
use crate::models::{Card, StatusEffect};

/// Turns `DrawCardsAction` into a hand of cards for the open round.
///
/// The first round asks only for cards and opening effects; later rounds
/// also ask the combatant to read its hp back from the last combat log.
/// Anyone whose request fails holds a single `Wait` card; the dead hold
/// nothing.
#[derive(Debug, Default)]
pub struct DrawCardsActionSystem {
    pending: Vec<String>,
}

impl Processor<GameContext> for DrawCardsActionSystem {
    fn name(&self) -> &'static str {
        "draw-cards"
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(Matcher::new().all_of::<DrawCardsAction>()))
    }

    fn filter(&self, ctx: &GameContext, entity: Entity) -> bool {
        ctx.combat().is_ongoing()
            && ctx.combat().latest_round().is_some_and(|r| !r.is_completed())
            && ctx.world().has::<CombatStatsComponent>(entity)
    }

    fn react(&mut self, ctx: &mut GameContext, entities: Vec<Entity>) -> agora_core::Result<()> {
        super::queue_names(ctx, &mut self.pending, entities);
        Ok(())
    }

    fn resolve(&mut self, ctx: &GameContext) -> Option<Continuation<GameContext>> {
        if self.pending.is_empty() {
            return None;
        }
        let names = mem::take(&mut self.pending);
        let round = ctx.combat().latest_round()?;
        let template = if ctx.combat().round_count() == 1 {
            DRAW_CARDS_FIRST_ROUND
        } else {
            DRAW_CARDS_LATER_ROUND
        };
        let card_count = ctx.config().combat.cards_per_draw.to_string();
        let action_order = round.action_order().join(" -> ");
        let prompt = render_template(
            template,
            &[("card_count", card_count.as_str()), ("action_order", action_order.as_str())],
        );

        let world = ctx.world();
        let (living, dead): (Vec<String>, Vec<String>) = names
            .into_iter()
            .partition(|name| world.entity_by_name(name).is_some_and(|e| is_alive(world, e)));
        let requests = living
            .iter()
            .map(|name| ctx.request_for(name, prompt.clone()))
            .collect();
        debug!(living = living.len(), dead = dead.len(), round = round.tag(), "drawing cards");
        Some(decision::batch(
            ctx.decisions(),
            requests,
            ctx.config().combat.request_timeout(),
            move |ctx, replies| apply(ctx, replies, &dead),
        ))
    }
}

fn apply(ctx: &mut GameContext, replies: Vec<DecisionReply>, dead: &[String]) -> agora_core::Result<()> {
    for name in dead {
        if let Some(entity) = ctx.world().entity_by_name(name) {
            ctx.world_mut().set(entity, HandComponent { cards: Vec::new() })?;
        }
    }
    for reply in replies {
        let Some(entity) = ctx.world().entity_by_name(&reply.entity) else {
            warn!(entity = %reply.entity, "combatant vanished while drawing");
            continue;
        };
        let cards = match reply.parse::<DrawCardsResponse>() {
            Some(drawn) => {
                if let Some(stats) = ctx.world_mut().get_mut::<CombatStatsComponent>(entity) {
                    if let Some(hp) = drawn.update_hp {
                        stats.hp = hp.clamp(0.0, stats.max_hp);
                    }
                    stats
                        .status_effects
                        .extend(drawn.status_effects.into_iter().map(StatusEffect::from));
                }
                if let Some(text) = reply.text() {
                    ctx.record_exchange(&reply.entity, &reply.prompt, text);
                }
                drawn.cards.into_iter().map(Card::from).collect()
            }
            None => Vec::new(),
        };
        let cards = if cards.is_empty() {
            vec![Card::wait(&reply.entity)]
        } else {
            cards
        };
        ctx.world_mut().set(entity, HandComponent { cards })?;
    }
    Ok(())
}
