use std::mem;

use agora_core::{Continuation, Processor, WorldContext};
use agora_llm::ChatMessage;
use agora_llm::prompt::{COMBAT_INIT, bullet_list, render_template};
use agora_llm::types::StatusEffectsResponse;
use tracing::{info, warn};

use crate::combat::participants;
use crate::components::{CombatStatsComponent, is_alive};
use crate::context::GameContext;
use crate::decision::{self, DecisionReply};
use crate::models::StatusEffect;

use super::open_round;

/// Moves a freshly started combat to ongoing.
///
/// `Starting` is picked up in `execute`; the continuation asks every living
/// participant for opening status effects, then the effect switches to
/// `Ongoing` and opens the first round. A participant whose request fails
/// starts without effects.
#[derive(Debug, Default)]
pub struct CombatInitializationSystem {
    pending: Vec<String>,
    stage: String,
}

impl Processor<GameContext> for CombatInitializationSystem {
    fn name(&self) -> &'static str {
        "combat-initialization"
    }

    fn execute(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        if !ctx.combat().is_starting() {
            return Ok(());
        }
        if let Err(e) = ctx.combat_mut().begin_initialization() {
            warn!(error = %e, "combat initialization skipped");
            return Ok(());
        }
        let Some(combat) = ctx.combat().current() else {
            return Ok(());
        };
        self.stage = combat.stage().to_string();
        let world = ctx.world();
        self.pending = participants(world, &self.stage)
            .into_iter()
            .filter(|&e| is_alive(world, e))
            .map(|e| ctx.name_of(e))
            .collect();
        info!(stage = %self.stage, participants = self.pending.len(), "combat initializing");
        Ok(())
    }

    fn resolve(&mut self, ctx: &GameContext) -> Option<Continuation<GameContext>> {
        if !ctx.combat().is_initializing() {
            return None;
        }
        let names = mem::take(&mut self.pending);
        let roster: Vec<String> = names
            .iter()
            .filter_map(|name| {
                let entity = ctx.world().entity_by_name(name)?;
                let stats = ctx.world().get::<CombatStatsComponent>(entity)?;
                Some(stats.hp_line(name))
            })
            .collect();
        let prompt = render_template(
            COMBAT_INIT,
            &[("stage_name", self.stage.as_str()), ("participants", bullet_list(&roster).as_str())],
        );
        let requests = names
            .iter()
            .map(|name| ctx.request_for(name, prompt.clone()))
            .collect();
        Some(decision::batch(
            ctx.decisions(),
            requests,
            ctx.config().combat.request_timeout(),
            apply,
        ))
    }
}

fn apply(ctx: &mut GameContext, replies: Vec<DecisionReply>) -> agora_core::Result<()> {
    let Some(start_tag) = ctx.combat().current().map(|c| c.start_tag()) else {
        return Ok(());
    };
    for reply in replies {
        let effects: Vec<StatusEffect> = reply
            .parse::<StatusEffectsResponse>()
            .map(|r| r.status_effects.into_iter().map(StatusEffect::from).collect())
            .unwrap_or_default();
        let Some(entity) = ctx.world().entity_by_name(&reply.entity) else {
            warn!(entity = %reply.entity, "combatant vanished during initialization");
            continue;
        };
        if let Some(stats) = ctx.world_mut().get_mut::<CombatStatsComponent>(entity) {
            stats.status_effects.extend(effects);
        }
        ctx.notify_tagged(&reply.entity, reply.prompt.as_str(), start_tag.as_str());
        if let Some(text) = reply.text() {
            ctx.history_mut(&reply.entity).push(ChatMessage::ai(text));
        }
    }
    if let Err(e) = ctx.combat_mut().begin_ongoing() {
        warn!(error = %e, "combat did not start");
        return Ok(());
    }
    if let Err(e) = open_round(ctx) {
        warn!(error = %e, "first round not opened");
    }
    Ok(())
}
