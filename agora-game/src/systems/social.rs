//! The social deduction table: night kills, day votes and the clock.
//!
//! ```text
//!   Night n ──NightKillSystem──▶ WolfKillAction ──KillResolutionSystem──▶ Death
//!      │                                                                   │
//!      └──────────── PhaseClockSystem (waits for the kill) ◀──────────────┘
//!   Day n ──DayVoteSystem──▶ speeches, plurality elimination ──▶ Night n+1
//! ```
//!
//! `SocialOutcomeSystem` runs first every tick and freezes the table once a
//! side has won.

use std::collections::BTreeMap;
use std::mem;

use agora_core::{Continuation, Entity, Matcher, Processor, Trigger, World, WorldContext};
use agora_llm::prompt::{DAY_VOTE, NIGHT_KILL, bullet_list, render_template};
use agora_llm::types::{DayVoteResponse, NightKillResponse};
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::components::{DeathComponent, SocialPlayerComponent, WerewolfComponent, WolfKillAction, is_alive};
use crate::context::GameContext;
use crate::decision::{self, DecisionReply};
use crate::events;
use crate::models::{SocialFaction, SocialPhase};

fn players(world: &World) -> Vec<Entity> {
    world.query(&Matcher::new().all_of::<SocialPlayerComponent>())
}

fn living_players(world: &World) -> Vec<Entity> {
    players(world)
        .into_iter()
        .filter(|&e| is_alive(world, e))
        .collect()
}

fn names(ctx: &GameContext, entities: &[Entity]) -> Vec<String> {
    entities.iter().map(|&e| ctx.name_of(e)).collect()
}

fn is_living_player(world: &World, name: &str) -> bool {
    world
        .entity_by_name(name)
        .is_some_and(|e| world.has::<SocialPlayerComponent>(e) && is_alive(world, e))
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Declares a winner: villagers once no werewolf lives, werewolves once
/// they are at least as many as everyone else.
#[derive(Debug, Default)]
pub struct SocialOutcomeSystem;

impl Processor<GameContext> for SocialOutcomeSystem {
    fn name(&self) -> &'static str {
        "social-outcome"
    }

    fn execute(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        if ctx.social().winner.is_some() {
            return Ok(());
        }
        let world = ctx.world();
        let seated = players(world);
        if seated.is_empty() {
            return Ok(());
        }
        let (wolves, others): (Vec<Entity>, Vec<Entity>) = living_players(world)
            .into_iter()
            .partition(|&e| world.has::<WerewolfComponent>(e));
        let winner = if wolves.is_empty() {
            SocialFaction::Villagers
        } else if wolves.len() >= others.len() {
            SocialFaction::Werewolves
        } else {
            return Ok(());
        };
        info!(winner = winner.label(), phase = ?ctx.social().phase, "social deduction decided");
        ctx.social_mut().winner = Some(winner);
        let everyone = names(ctx, &seated);
        ctx.broadcast(&everyone, &events::social_outcome(winner));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Night
// ---------------------------------------------------------------------------

/// Once per night, every living werewolf proposes a victim; one valid
/// proposal is drawn at random. No valid proposal means nobody dies.
#[derive(Debug, Default)]
pub struct NightKillSystem {
    handled: Option<u32>,
    pending: Vec<String>,
    candidates: Vec<String>,
}

impl Processor<GameContext> for NightKillSystem {
    fn name(&self) -> &'static str {
        "night-kill"
    }

    fn execute(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        let SocialPhase::Night(night) = ctx.social().phase else {
            return Ok(());
        };
        if ctx.social().winner.is_some() || self.handled == Some(night) {
            return Ok(());
        }
        self.handled = Some(night);
        let world = ctx.world();
        let (wolves, others): (Vec<Entity>, Vec<Entity>) = living_players(world)
            .into_iter()
            .partition(|&e| world.has::<WerewolfComponent>(e));
        self.pending = names(ctx, &wolves);
        self.candidates = names(ctx, &others);
        debug!(night, wolves = self.pending.len(), "night falls");
        Ok(())
    }

    fn resolve(&mut self, ctx: &GameContext) -> Option<Continuation<GameContext>> {
        if self.pending.is_empty() {
            return None;
        }
        let night = self.handled?;
        let prompt = render_template(
            NIGHT_KILL,
            &[
                ("night", night.to_string().as_str()),
                ("candidates", bullet_list(&self.candidates).as_str()),
            ],
        );
        let requests = mem::take(&mut self.pending)
            .iter()
            .map(|wolf| ctx.request_for(wolf, prompt.clone()))
            .collect();
        Some(decision::batch(
            ctx.decisions(),
            requests,
            ctx.config().combat.request_timeout(),
            move |ctx, replies| apply_kill(ctx, replies, night),
        ))
    }
}

fn apply_kill(ctx: &mut GameContext, replies: Vec<DecisionReply>, night: u32) -> agora_core::Result<()> {
    let mut proposals = Vec::new();
    for reply in replies {
        let Some(choice) = reply.parse::<NightKillResponse>() else {
            continue;
        };
        if let Some(text) = reply.text() {
            ctx.record_exchange(&reply.entity, &reply.prompt, text);
        }
        let world = ctx.world();
        let valid = is_living_player(world, &choice.target)
            && world
                .entity_by_name(&choice.target)
                .is_some_and(|e| !world.has::<WerewolfComponent>(e));
        if valid {
            proposals.push(choice.target);
        } else {
            warn!(wolf = %reply.entity, target = %choice.target, "invalid night target ignored");
        }
    }
    let Some(victim) = proposals.choose(ctx.rng()).cloned() else {
        info!(night, "the night passes without a kill");
        return Ok(());
    };
    if let Some(entity) = ctx.world().entity_by_name(&victim) {
        info!(night, victim = %victim, "werewolves strike");
        ctx.world_mut().set(entity, WolfKillAction { night })?;
    }
    Ok(())
}

/// Turns a `WolfKillAction` into a death announced the next morning.
#[derive(Debug, Default)]
pub struct KillResolutionSystem;

impl Processor<GameContext> for KillResolutionSystem {
    fn name(&self) -> &'static str {
        "kill-resolution"
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(Matcher::new().all_of::<WolfKillAction>()))
    }

    fn filter(&self, ctx: &GameContext, entity: Entity) -> bool {
        is_alive(ctx.world(), entity)
    }

    fn react(&mut self, ctx: &mut GameContext, entities: Vec<Entity>) -> agora_core::Result<()> {
        for victim in entities {
            let Some(night) = ctx.world().get::<WolfKillAction>(victim).map(|a| a.night) else {
                continue;
            };
            ctx.world_mut().set(victim, DeathComponent)?;
            let notice = events::night_death(night, &ctx.name_of(victim));
            let everyone = names(ctx, &players(ctx.world()));
            ctx.broadcast(&everyone, &notice);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Day
// ---------------------------------------------------------------------------

/// Once per day, every living player speaks and votes. A strict plurality
/// eliminates its target; a tie or no valid vote eliminates nobody.
#[derive(Debug, Default)]
pub struct DayVoteSystem {
    handled: Option<u32>,
    pending: Vec<String>,
}

impl Processor<GameContext> for DayVoteSystem {
    fn name(&self) -> &'static str {
        "day-vote"
    }

    fn execute(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        let SocialPhase::Day(day) = ctx.social().phase else {
            return Ok(());
        };
        if ctx.social().winner.is_some() || self.handled == Some(day) {
            return Ok(());
        }
        self.handled = Some(day);
        self.pending = names(ctx, &living_players(ctx.world()));
        Ok(())
    }

    fn resolve(&mut self, ctx: &GameContext) -> Option<Continuation<GameContext>> {
        if self.pending.is_empty() {
            return None;
        }
        let day = self.handled?;
        let prompt = render_template(
            DAY_VOTE,
            &[("day", day.to_string().as_str()), ("candidates", bullet_list(&self.pending).as_str())],
        );
        let requests = mem::take(&mut self.pending)
            .iter()
            .map(|player| ctx.request_for(player, prompt.clone()))
            .collect();
        Some(decision::batch(
            ctx.decisions(),
            requests,
            ctx.config().combat.request_timeout(),
            move |ctx, replies| apply_vote(ctx, replies, day),
        ))
    }
}

/// The unique most-voted name, if any.
fn plurality(votes: &BTreeMap<String, usize>) -> Option<&str> {
    let top = votes.values().copied().max()?;
    let mut leaders = votes.iter().filter(|(_, count)| **count == top);
    let (name, _) = leaders.next()?;
    leaders.next().is_none().then_some(name.as_str())
}

fn apply_vote(ctx: &mut GameContext, replies: Vec<DecisionReply>, day: u32) -> agora_core::Result<()> {
    let table = names(ctx, &living_players(ctx.world()));
    let mut votes: BTreeMap<String, usize> = BTreeMap::new();
    for reply in replies {
        let Some(ballot) = reply.parse::<DayVoteResponse>() else {
            continue;
        };
        if let Some(text) = reply.text() {
            ctx.record_exchange(&reply.entity, &reply.prompt, text);
        }
        if !ballot.speech.trim().is_empty() {
            let listeners: Vec<&String> = table.iter().filter(|n| **n != reply.entity).collect();
            ctx.broadcast(&listeners, &events::day_speech(&reply.entity, &ballot.speech));
        }
        match ballot.vote {
            Some(target) if is_living_player(ctx.world(), &target) => *votes.entry(target).or_default() += 1,
            Some(target) => debug!(voter = %reply.entity, target = %target, "vote for an invalid target ignored"),
            None => {}
        }
    }

    let eliminated = plurality(&votes).map(str::to_string);
    if let Some(name) = &eliminated {
        if let Some(entity) = ctx.world().entity_by_name(name) {
            info!(day, eliminated = %name, "the town votes");
            ctx.world_mut().set(entity, DeathComponent)?;
        }
    } else {
        info!(day, "the vote is split");
    }
    ctx.broadcast(&table, &events::vote_result(day, eliminated.as_deref()));
    Ok(())
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Advances night to day and day to night at the end of each tick.
///
/// Holds while a kill is still waiting to be resolved, and stops for good
/// once a side has won.
#[derive(Debug, Default)]
pub struct PhaseClockSystem;

impl Processor<GameContext> for PhaseClockSystem {
    fn name(&self) -> &'static str {
        "phase-clock"
    }

    fn cleanup(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        if ctx.social().winner.is_some() || players(ctx.world()).is_empty() {
            return Ok(());
        }
        if !ctx.world().query(&Matcher::new().all_of::<WolfKillAction>()).is_empty() {
            return Ok(());
        }
        let next = ctx.social().phase.next();
        debug!(from = ?ctx.social().phase, to = ?next, "phase advances");
        ctx.social_mut().phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ActorComponent, VillagerComponent};
    use crate::testing::context_with;
    use agora_llm::ScriptedDecisions;

    fn table(ctx: &mut GameContext, seats: &[(&str, bool)]) -> Vec<Entity> {
        seats
            .iter()
            .map(|&(name, wolf)| {
                let e = ctx.world_mut().create(name).unwrap();
                ctx.world_mut().set(e, ActorComponent { stage: "Village".into() }).unwrap();
                ctx.world_mut().set(e, SocialPlayerComponent).unwrap();
                if wolf {
                    ctx.world_mut().set(e, WerewolfComponent).unwrap();
                } else {
                    ctx.world_mut().set(e, VillagerComponent).unwrap();
                }
                ctx.set_persona(name, format!("You are {name}."));
                e
            })
            .collect()
    }

    #[test]
    fn plurality_needs_a_unique_leader() {
        let mut votes = BTreeMap::new();
        assert_eq!(plurality(&votes), None);
        votes.insert("Ann".to_string(), 2);
        votes.insert("Bob".to_string(), 2);
        assert_eq!(plurality(&votes), None);
        votes.insert("Cid".to_string(), 3);
        assert_eq!(plurality(&votes), Some("Cid"));
    }

    #[tokio::test]
    async fn tied_vote_eliminates_nobody() {
        let script = ScriptedDecisions::new()
            .on("You are Ann.", r#"{"speech": "Bob is odd.", "vote": "Bob"}"#)
            .on("You are Bob.", r#"{"speech": "Ann is odd.", "vote": "Ann"}"#)
            .on("You are Cid.", r#"{"speech": "Hmm.", "vote": null}"#);
        let mut ctx = context_with(script);
        let seats = table(&mut ctx, &[("Ann", false), ("Bob", false), ("Cid", true)]);
        ctx.social_mut().phase = SocialPhase::Day(1);

        let mut system = DayVoteSystem::default();
        system.execute(&mut ctx).unwrap();
        let effect = system.resolve(&ctx).unwrap().await;
        effect(&mut ctx).unwrap();

        assert!(seats.iter().all(|&e| !ctx.world().has::<DeathComponent>(e)));
        let cid = ctx.history("Cid").unwrap();
        assert!(cid.search("nobody was eliminated").next().is_some());
        assert!(cid.search("Ann says: Bob is odd.").next().is_some());

        // Same day again: no second vote.
        system.execute(&mut ctx).unwrap();
        assert!(system.resolve(&ctx).is_none());
    }

    #[tokio::test]
    async fn night_kill_then_morning() {
        let script = ScriptedDecisions::new().on("You are Wolf.", r#"{"target": "Ann", "reason": "too clever"}"#);
        let mut ctx = context_with(script);
        let seats = table(&mut ctx, &[("Ann", false), ("Bob", false), ("Wolf", true)]);

        let mut night = NightKillSystem::default();
        let mut clock = PhaseClockSystem;
        night.execute(&mut ctx).unwrap();
        let effect = night.resolve(&ctx).unwrap().await;
        effect(&mut ctx).unwrap();
        assert!(ctx.world().has::<WolfKillAction>(seats[0]));

        clock.cleanup(&mut ctx).unwrap();
        assert_eq!(ctx.social().phase, SocialPhase::Night(1));

        KillResolutionSystem.react(&mut ctx, vec![seats[0]]).unwrap();
        assert!(ctx.world().has::<DeathComponent>(seats[0]));
        assert!(ctx.history("Bob").unwrap().search("Ann was found dead").next().is_some());

        ctx.world_mut().remove::<WolfKillAction>(seats[0]).unwrap();
        clock.cleanup(&mut ctx).unwrap();
        assert_eq!(ctx.social().phase, SocialPhase::Day(1));

        // One wolf against one villager: the wolves win.
        SocialOutcomeSystem.execute(&mut ctx).unwrap();
        assert_eq!(ctx.social().winner, Some(SocialFaction::Werewolves));
    }
}
