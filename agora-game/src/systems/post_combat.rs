use agora_core::{Continuation, Processor, WorldContext};
use agora_llm::ChatMessage;
use agora_llm::prompt::{COMBAT_SUMMARY, render_template};
use tracing::{info, warn};

use crate::combat::participants;
use crate::components::{AllyComponent, is_alive};
use crate::context::GameContext;
use crate::decision::{self, DecisionReply};
use crate::events;

#[derive(Debug)]
struct Wrapup {
    stage: String,
    start_tag: String,
    outcome_tag: String,
    outcome: &'static str,
    allies: Vec<String>,
}

/// Closes a completed combat.
///
/// Every living ally writes a first-person summary; the summary replaces
/// everything in that ally's history from the combat-start message to the
/// outcome message. Then the combat moves to post-combat.
#[derive(Debug, Default)]
pub struct CombatPostProcessingSystem {
    pending: Option<Wrapup>,
}

impl Processor<GameContext> for CombatPostProcessingSystem {
    fn name(&self) -> &'static str {
        "combat-post-processing"
    }

    fn execute(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        if self.pending.is_some() {
            return Ok(());
        }
        let Some(result) = ctx.combat().completed_result() else {
            return Ok(());
        };
        let Some(combat) = ctx.combat().current() else {
            return Ok(());
        };
        let world = ctx.world();
        let allies = participants(world, combat.stage())
            .into_iter()
            .filter(|&e| world.has::<AllyComponent>(e) && is_alive(world, e))
            .map(|e| ctx.name_of(e))
            .collect();
        self.pending = Some(Wrapup {
            stage: combat.stage().to_string(),
            start_tag: combat.start_tag(),
            outcome_tag: combat.outcome_tag(),
            outcome: result.label(),
            allies,
        });
        Ok(())
    }

    fn resolve(&mut self, ctx: &GameContext) -> Option<Continuation<GameContext>> {
        let wrapup = self.pending.take()?;
        let requests = wrapup
            .allies
            .iter()
            .map(|name| {
                let prompt = render_template(
                    COMBAT_SUMMARY,
                    &[("actor_name", name.as_str()), ("stage_name", wrapup.stage.as_str())],
                );
                ctx.request_for(name, prompt)
            })
            .collect();
        Some(decision::batch(
            ctx.decisions(),
            requests,
            ctx.config().combat.request_timeout(),
            move |ctx, replies| apply(ctx, replies, &wrapup),
        ))
    }
}

fn apply(ctx: &mut GameContext, replies: Vec<DecisionReply>, wrapup: &Wrapup) -> agora_core::Result<()> {
    for reply in replies {
        let summary = reply.text().map_or_else(
            || format!("I fought at {}. It ended in {}.", wrapup.stage, wrapup.outcome),
            str::to_string,
        );
        let archive = ChatMessage::human(events::combat_archive(&reply.entity, &wrapup.stage, &summary));
        let history = ctx.history_mut(&reply.entity);
        if !history.compress_between(&wrapup.start_tag, &wrapup.outcome_tag, vec![archive.clone()]) {
            warn!(actor = %reply.entity, "combat transcript not found; appending summary");
            history.push(archive);
        }
    }
    match ctx.combat_mut().finish_post_combat() {
        Ok(()) => info!(stage = %wrapup.stage, "combat archived"),
        Err(e) => warn!(error = %e, "post-combat transition skipped"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CombatResult;
    use crate::testing::{dungeon_context_with, ongoing_combat, spawn_fighter};
    use agora_llm::ScriptedDecisions;

    #[tokio::test]
    async fn transcript_is_replaced_by_summary() {
        let script = ScriptedDecisions::new().on("You are Kael.", "We won, barely.");
        let mut ctx = dungeon_context_with(script);
        spawn_fighter(&mut ctx, "Kael", true, 30.0);
        spawn_fighter(&mut ctx, "Goblin", false, 0.0);
        ongoing_combat(&mut ctx, "c1");
        ctx.notify("Kael", "before the fight");
        ctx.notify_tagged("Kael", "combat begins", "combat-start:c1");
        ctx.notify("Kael", "round one");
        ctx.notify_tagged("Kael", "victory", "combat-outcome:c1");
        ctx.combat_mut().complete(CombatResult::Win).unwrap();

        let mut system = CombatPostProcessingSystem::default();
        system.execute(&mut ctx).unwrap();
        let effect = system.resolve(&ctx).unwrap().await;
        effect(&mut ctx).unwrap();

        assert!(ctx.combat().is_post_combat());
        let history = ctx.history("Kael").unwrap();
        // persona, the pre-fight note, the archive
        assert_eq!(history.len(), 3);
        assert!(history.last().unwrap().content.contains("We won, barely."));
        assert!(history.search("round one").next().is_none());
    }
}
