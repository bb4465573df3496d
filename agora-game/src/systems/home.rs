//! Free time at home: planning, speaking and announcing.

use std::collections::BTreeMap;
use std::mem;

use agora_core::{Continuation, Entity, Matcher, Processor, Trigger, WorldContext};
use agora_llm::prompt::{HOME_PLAN, bullet_list, render_template};
use agora_llm::types::HomePlanResponse;
use tracing::{debug, warn};

use crate::components::{
    ActorComponent, AnnounceAction, HomeComponent, KickOffComponent, KickOffDoneComponent, PlayerComponent,
    SpeakAction, StageComponent, is_alive,
};
use crate::context::GameContext;
use crate::decision::{self, DecisionReply};
use crate::events;

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Asks every idle, non-player actor at home what it does next.
///
/// An actor is idle once its kick-off is done and its last plan has been
/// delivered. A failed or empty plan means the actor does nothing this tick.
#[derive(Debug, Default)]
pub struct HomeActorPlanningSystem {
    pending: Vec<String>,
}

impl HomeActorPlanningSystem {
    fn is_idle(ctx: &GameContext, actor: Entity) -> bool {
        let world = ctx.world();
        is_alive(world, actor)
            && !world.has::<SpeakAction>(actor)
            && !world.has::<AnnounceAction>(actor)
            && (!world.has::<KickOffComponent>(actor) || world.has::<KickOffDoneComponent>(actor))
    }
}

impl Processor<GameContext> for HomeActorPlanningSystem {
    fn name(&self) -> &'static str {
        "home-actor-planning"
    }

    fn execute(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        if !ctx.decisions().is_available() {
            return Ok(());
        }
        let world = ctx.world();
        let homes: Vec<String> = world
            .query(&Matcher::new().all_of::<StageComponent>().all_of::<HomeComponent>())
            .into_iter()
            .filter_map(|e| world.name(e).map(str::to_string))
            .collect();
        let actors = world.query(&Matcher::new().all_of::<ActorComponent>().none_of::<PlayerComponent>());
        let idle: Vec<Entity> = actors
            .into_iter()
            .filter(|&e| {
                world
                    .get::<ActorComponent>(e)
                    .is_some_and(|a| homes.contains(&a.stage))
            })
            .filter(|&e| Self::is_idle(ctx, e))
            .collect();
        super::queue_names(ctx, &mut self.pending, idle);
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
                let stage = world.get::<ActorComponent>(world.entity_by_name(&name)?)?.stage.clone();
                let present: Vec<String> = ctx
                    .actors_on(&stage)
                    .into_iter()
                    .filter(|&e| is_alive(world, e))
                    .map(|e| ctx.name_of(e))
                    .filter(|other| *other != name)
                    .collect();
                let present = if present.is_empty() {
                    "Nobody else.".to_string()
                } else {
                    bullet_list(&present)
                };
                let prompt = render_template(
                    HOME_PLAN,
                    &[("stage_name", stage.as_str()), ("present", present.as_str())],
                );
                Some(ctx.request_for(&name, prompt))
            })
            .collect();
        debug!(count = requests.len(), "home planning requests");
        Some(decision::batch(
            ctx.decisions(),
            requests,
            ctx.config().combat.request_timeout(),
            apply_plans,
        ))
    }
}

fn apply_plans(ctx: &mut GameContext, replies: Vec<DecisionReply>) -> agora_core::Result<()> {
    for reply in replies {
        let Some(plan) = reply.parse::<HomePlanResponse>() else {
            continue;
        };
        let Some(actor) = ctx.world().entity_by_name(&reply.entity) else {
            warn!(entity = %reply.entity, "actor vanished while planning");
            continue;
        };
        if let Some(text) = reply.text() {
            ctx.record_exchange(&reply.entity, &reply.prompt, text);
        }
        let lines: BTreeMap<String, String> = plan
            .speak
            .into_iter()
            .filter(|(listener, line)| *listener != reply.entity && !line.trim().is_empty())
            .collect();
        if !lines.is_empty() {
            ctx.world_mut().set(actor, SpeakAction { lines })?;
        }
        if let Some(line) = plan.announce.filter(|l| !l.trim().is_empty()) {
            ctx.world_mut().set(actor, AnnounceAction { line })?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Delivers `SpeakAction` lines to listeners on the speaker's stage.
#[derive(Debug, Default)]
pub struct SpeakActionSystem;

impl Processor<GameContext> for SpeakActionSystem {
    fn name(&self) -> &'static str {
        "speak"
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(Matcher::new().all_of::<SpeakAction>()))
    }

    fn react(&mut self, ctx: &mut GameContext, entities: Vec<Entity>) -> agora_core::Result<()> {
        for speaker in entities {
            let world = ctx.world();
            let (Some(action), Some(stage)) = (world.get::<SpeakAction>(speaker), world.get::<ActorComponent>(speaker))
            else {
                continue;
            };
            let lines = action.lines.clone();
            let stage = stage.stage.clone();
            let speaker = ctx.name_of(speaker);
            for (listener, line) in lines {
                let here = ctx
                    .world()
                    .entity_by_name(&listener)
                    .and_then(|e| ctx.world().get::<ActorComponent>(e))
                    .is_some_and(|a| a.stage == stage);
                if !here {
                    warn!(speaker = %speaker, listener = %listener, "listener not on the speaker's stage");
                    continue;
                }
                ctx.notify(&listener, events::speech(&speaker, &listener, &line));
            }
        }
        Ok(())
    }
}

/// Delivers an `AnnounceAction` line to everyone else on the stage.
#[derive(Debug, Default)]
pub struct AnnounceActionSystem;

impl Processor<GameContext> for AnnounceActionSystem {
    fn name(&self) -> &'static str {
        "announce"
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(Matcher::new().all_of::<AnnounceAction>()))
    }

    fn react(&mut self, ctx: &mut GameContext, entities: Vec<Entity>) -> agora_core::Result<()> {
        for speaker in entities {
            let world = ctx.world();
            let (Some(action), Some(stage)) = (world.get::<AnnounceAction>(speaker), world.get::<ActorComponent>(speaker))
            else {
                continue;
            };
            let notice = events::announcement(&ctx.name_of(speaker), &stage.stage, &action.line);
            let audience: Vec<String> = ctx
                .actors_on(&stage.stage)
                .into_iter()
                .filter(|&e| e != speaker)
                .map(|e| ctx.name_of(e))
                .collect();
            ctx.broadcast(&audience, &notice);
        }
        Ok(())
    }
}
