use agora_core::{Continuation, Entity, Matcher, Processor, Trigger, WorldContext};
use agora_llm::prompt::{ARBITRATION, bullet_list, render_template};
use agora_llm::types::ArbitrationResponse;
use tracing::{info, warn};

use crate::components::{ArbitrationAction, CombatStatsComponent, HandComponent, PlayCardsAction};
use crate::context::GameContext;
use crate::decision::{self, DecisionReply};
use crate::events;

const UNEVENTFUL_NARRATIVE: &str = "The combatants circle each other. Nothing decisive happens this round.";

/// Resolves a whole round with a single request on the stage's history.
///
/// The prompt lists the living combatants in action order with their hp,
/// active effects and committed card. The reply's hp updates are applied,
/// the result is broadcast to the round's participants and the round is
/// closed. A failed request still closes the round, as an uneventful one.
#[derive(Debug, Default)]
pub struct ArbitrationActionSystem {
    pending: Option<(String, String)>,
}

fn combatant_line(ctx: &GameContext, entity: Entity) -> Option<String> {
    let name = ctx.world().name(entity)?;
    let stats = ctx.world().get::<CombatStatsComponent>(entity)?;
    let effects = if stats.status_effects.is_empty() {
        "none".to_string()
    } else {
        stats
            .status_effects
            .iter()
            .map(|e| format!("{} ({} rounds)", e.name, e.duration))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let play = ctx.world().get::<PlayCardsAction>(entity).map_or_else(
        || "plays nothing".to_string(),
        |action| {
            format!(
                "plays [{}] on {}: {}",
                action.card.name,
                action.card.target_list(),
                action.card.description
            )
        },
    );
    Some(format!("{}; effects: {effects}; {play}", stats.hp_line(name)))
}

impl Processor<GameContext> for ArbitrationActionSystem {
    fn name(&self) -> &'static str {
        "arbitration"
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(Matcher::new().all_of::<ArbitrationAction>()))
    }

    fn filter(&self, ctx: &GameContext, entity: Entity) -> bool {
        let combat = ctx.combat();
        combat.is_ongoing()
            && combat.latest_round().is_some_and(|r| !r.is_completed())
            && combat
                .current()
                .is_some_and(|c| ctx.world().name(entity) == Some(c.stage()))
    }

    fn react(&mut self, ctx: &mut GameContext, entities: Vec<Entity>) -> agora_core::Result<()> {
        let Some(&stage) = entities.first() else {
            return Ok(());
        };
        let Some(round) = ctx.combat().latest_round() else {
            return Ok(());
        };
        let order = round.living_order(ctx.world());
        let order_names: Vec<String> = order.iter().map(|&e| ctx.name_of(e)).collect();
        let combatants: Vec<String> = order.iter().filter_map(|&e| combatant_line(ctx, e)).collect();
        let prompt = render_template(
            ARBITRATION,
            &[
                ("round_number", ctx.combat().round_count().to_string().as_str()),
                ("action_order", order_names.join(" -> ").as_str()),
                ("combatants", bullet_list(&combatants).as_str()),
            ],
        );
        self.pending = Some((ctx.name_of(stage), prompt));
        Ok(())
    }

    fn resolve(&mut self, ctx: &GameContext) -> Option<Continuation<GameContext>> {
        let (stage, prompt) = self.pending.take()?;
        let request = ctx.request_for(&stage, prompt);
        Some(decision::batch(
            ctx.decisions(),
            vec![request],
            ctx.config().combat.request_timeout(),
            apply,
        ))
    }
}

fn apply(ctx: &mut GameContext, replies: Vec<DecisionReply>) -> agora_core::Result<()> {
    let Some(reply) = replies.into_iter().next() else {
        return Ok(());
    };
    let (combat_log, narrative) = match reply.parse::<ArbitrationResponse>() {
        Some(verdict) => {
            for (name, hp) in verdict.hp_updates {
                let Some(entity) = ctx.world().entity_by_name(&name) else {
                    warn!(actor = %name, "arbiter updated an unknown combatant");
                    continue;
                };
                if let Some(stats) = ctx.world_mut().get_mut::<CombatStatsComponent>(entity) {
                    stats.hp = hp.min(stats.max_hp);
                }
            }
            if let Some(text) = reply.text() {
                ctx.record_exchange(&reply.entity, &reply.prompt, text);
            }
            (verdict.combat_log, verdict.narrative)
        }
        None => (String::new(), UNEVENTFUL_NARRATIVE.to_string()),
    };

    let Some(participants) = ctx.combat().latest_round().map(|r| r.action_order().to_vec()) else {
        return Ok(());
    };
    let round_number = ctx.combat().round_count();
    ctx.broadcast(&participants, &events::round_result(round_number, &narrative, &combat_log));
    match ctx.combat_mut().complete_round(combat_log, narrative) {
        Ok(round) => info!(round = round.tag(), "round arbitrated"),
        Err(e) => warn!(error = %e, "arbitration result discarded"),
    }
    for name in &participants {
        if let Some(entity) = ctx.world().entity_by_name(name) {
            ctx.world_mut().remove::<HandComponent>(entity)?;
        }
    }
    Ok(())
}
