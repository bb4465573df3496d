use std::mem;

use agora_core::{Continuation, Entity, Matcher, Processor, Trigger, WorldContext};
use agora_llm::prompt::{KICK_OFF, render_template};
use tracing::{debug, warn};

use crate::components::{ActorComponent, KickOffComponent, KickOffDoneComponent};
use crate::context::GameContext;
use crate::decision::{self, DecisionReply};

fn waiting() -> Matcher {
    Matcher::new()
        .all_of::<KickOffComponent>()
        .none_of::<KickOffDoneComponent>()
}

/// Delivers every entity's kick-off message exactly once.
///
/// Entities already waiting when the pipeline initializes are picked up by
/// `initialize`; later arrivals through the trigger.
#[derive(Debug, Default)]
pub struct KickOffSystem {
    pending: Vec<String>,
}

impl Processor<GameContext> for KickOffSystem {
    fn name(&self) -> &'static str {
        "kick-off"
    }

    fn initialize(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        let entities = ctx.world().query(&waiting());
        super::queue_names(ctx, &mut self.pending, entities);
        Ok(())
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(waiting()))
    }

    fn react(&mut self, ctx: &mut GameContext, entities: Vec<Entity>) -> agora_core::Result<()> {
        super::queue_names(ctx, &mut self.pending, entities);
        Ok(())
    }

    fn resolve(&mut self, ctx: &GameContext) -> Option<Continuation<GameContext>> {
        if self.pending.is_empty() {
            return None;
        }
        let world = ctx.world();
        let requests: Vec<_> = mem::take(&mut self.pending)
            .into_iter()
            .filter_map(|name| {
                let entity = world.entity_by_name(&name)?;
                let message = &world.get::<KickOffComponent>(entity)?.message;
                let stage = world
                    .get::<ActorComponent>(entity)
                    .map_or(name.as_str(), |a| a.stage.as_str());
                let prompt = render_template(KICK_OFF, &[("stage_name", stage), ("kick_off_message", message.as_str())]);
                Some(ctx.request_for(&name, prompt))
            })
            .collect();
        debug!(count = requests.len(), "kick-off requests");
        Some(decision::batch(
            ctx.decisions(),
            requests,
            ctx.config().combat.request_timeout(),
            apply,
        ))
    }
}

fn apply(ctx: &mut GameContext, replies: Vec<DecisionReply>) -> agora_core::Result<()> {
    for reply in replies {
        let Some(entity) = ctx.world().entity_by_name(&reply.entity) else {
            warn!(entity = %reply.entity, "kick-off target vanished while waiting");
            continue;
        };
        if ctx.world().has::<KickOffDoneComponent>(entity) {
            continue;
        }
        let response = reply.text().map(str::to_string).unwrap_or_default();
        if !response.is_empty() {
            ctx.record_exchange(&reply.entity, &reply.prompt, &response);
        }
        ctx.world_mut().set(entity, KickOffDoneComponent { response })?;
    }
    Ok(())
}
