//! The combat sequence state machine.
//!
//! ```text
//!   start_combat        begin_initialization      begin_ongoing
//! ───────────────▶ Starting ──────────▶ Initializing ──────────▶ Ongoing ──┐
//!                                                                  ▲       │ create_round /
//!                                                                  └───────┘ complete_round
//!                                             complete(result)     │
//!                         PostCombat ◀────────── Completed ◀───────┘
//!                                  finish_post_combat
//! ```
//!
//! Every transition validates the current state and returns
//! [`CombatError`] instead of moving on an invalid one; processors log the
//! error and carry on.

use std::fmt;

use agora_core::{Entity, Matcher, World};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{ActorComponent, CombatStatsComponent, is_alive, is_standing};
use crate::config::ActionOrderStrategy;
use crate::models::StatusEffect;

/// Result of a finished combat, from the allies' point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatResult {
    /// Every enemy is down.
    Win,
    /// Every ally is down.
    Lose,
}

impl CombatResult {
    /// Short label for notifications.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Win => "victory",
            Self::Lose => "defeat",
        }
    }
}

/// Where a combat is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatState {
    /// Announced on dungeon entry, nothing generated yet.
    Starting,
    /// Opening status effects are being generated.
    Initializing,
    /// Rounds are being played.
    Ongoing,
    /// A faction is down.
    Completed(CombatResult),
    /// Summaries written and histories compressed.
    PostCombat,
}

impl fmt::Display for CombatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ongoing => write!(f, "ongoing"),
            Self::Completed(result) => write!(f, "completed({})", result.label()),
            Self::PostCombat => write!(f, "post-combat"),
        }
    }
}

/// Invalid combat operations. Always recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    /// No combat has been started.
    #[error("no combat has been started")]
    NoCombat,
    /// A combat with this name already ran.
    #[error("combat '{0}' already exists")]
    DuplicateCombat(String),
    /// The current combat has not reached post-combat yet.
    #[error("combat '{0}' is still running")]
    CombatInProgress(String),
    /// The transition is not valid from the current state.
    #[error("cannot move combat from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: CombatState,
        /// Requested state.
        to: &'static str,
    },
    /// The latest round is still open.
    #[error("round '{0}' is still open")]
    RoundInProgress(String),
    /// There is no open round to complete.
    #[error("no open round")]
    NoOpenRound,
    /// A round needs at least one living participant.
    #[error("no living participants")]
    NoParticipants,
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// One turn cycle with a fixed action order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    tag: String,
    action_order: Vec<String>,
    combat_log: String,
    narrative: String,
    completed: bool,
    #[serde(default)]
    settled: bool,
}

impl Round {
    fn new(tag: String, action_order: Vec<String>) -> Self {
        Self {
            tag,
            action_order,
            combat_log: String::new(),
            narrative: String::new(),
            completed: false,
            settled: false,
        }
    }

    /// Unique tag, `"<combat>-round-<n>"`.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Participant names as fixed at creation.
    #[must_use]
    pub fn action_order(&self) -> &[String] {
        &self.action_order
    }

    /// Arbiter's combat log, empty until completed.
    #[must_use]
    pub fn combat_log(&self) -> &str {
        &self.combat_log
    }

    /// Arbiter's narrative, empty until completed.
    #[must_use]
    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    /// Whether the round has been arbitrated.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether status effects have been aged for this round's boundary.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// The fixed order, skipping participants that are gone, dead or marked
    /// for destruction. The stored order is never touched.
    #[must_use]
    pub fn living_order(&self, world: &World) -> Vec<Entity> {
        self.action_order
            .iter()
            .filter_map(|name| world.entity_by_name(name))
            .filter(|&entity| is_alive(world, entity))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Combat & CombatSequence
// ---------------------------------------------------------------------------

/// One combat and its rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combat {
    name: String,
    stage: String,
    state: CombatState,
    rounds: Vec<Round>,
}

impl Combat {
    /// Combat name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the stage it takes place on.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CombatState {
        self.state
    }

    /// Rounds so far, oldest first.
    #[must_use]
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// The most recent round.
    #[must_use]
    pub fn latest_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// History tag marking the start of this combat.
    #[must_use]
    pub fn start_tag(&self) -> String {
        format!("combat-start:{}", self.name)
    }

    /// History tag marking the outcome of this combat.
    #[must_use]
    pub fn outcome_tag(&self) -> String {
        format!("combat-outcome:{}", self.name)
    }
}

/// Every combat of a run. Only the last one can be active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatSequence {
    combats: Vec<Combat>,
}

impl CombatSequence {
    /// No combats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All combats, oldest first.
    #[must_use]
    pub fn combats(&self) -> &[Combat] {
        &self.combats
    }

    /// The most recent combat.
    #[must_use]
    pub fn current(&self) -> Option<&Combat> {
        self.combats.last()
    }

    /// State of the most recent combat.
    #[must_use]
    pub fn state(&self) -> Option<CombatState> {
        self.current().map(Combat::state)
    }

    /// `Starting`.
    #[must_use]
    pub fn is_starting(&self) -> bool {
        self.state() == Some(CombatState::Starting)
    }

    /// `Initializing`.
    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.state() == Some(CombatState::Initializing)
    }

    /// `Ongoing`.
    #[must_use]
    pub fn is_ongoing(&self) -> bool {
        self.state() == Some(CombatState::Ongoing)
    }

    /// `Completed`, with its result.
    #[must_use]
    pub fn completed_result(&self) -> Option<CombatResult> {
        match self.state() {
            Some(CombatState::Completed(result)) => Some(result),
            _ => None,
        }
    }

    /// `PostCombat`.
    #[must_use]
    pub fn is_post_combat(&self) -> bool {
        self.state() == Some(CombatState::PostCombat)
    }

    /// Number of rounds in the current combat.
    #[must_use]
    pub fn round_count(&self) -> usize {
        self.current().map_or(0, |c| c.rounds.len())
    }

    /// The current combat's most recent round.
    #[must_use]
    pub fn latest_round(&self) -> Option<&Round> {
        self.current().and_then(Combat::latest_round)
    }

    /// Announce a new combat on `stage`.
    ///
    /// # Errors
    /// [`CombatError::DuplicateCombat`] if the name was used before,
    /// [`CombatError::CombatInProgress`] if the current combat has not
    /// reached post-combat.
    pub fn start_combat(&mut self, name: impl Into<String>, stage: impl Into<String>) -> Result<(), CombatError> {
        let name = name.into();
        if self.combats.iter().any(|c| c.name == name) {
            return Err(CombatError::DuplicateCombat(name));
        }
        if let Some(current) = self.current() {
            if current.state != CombatState::PostCombat {
                return Err(CombatError::CombatInProgress(current.name.clone()));
            }
        }
        self.combats.push(Combat {
            name,
            stage: stage.into(),
            state: CombatState::Starting,
            rounds: Vec::new(),
        });
        Ok(())
    }

    fn transition(
        &mut self,
        from: impl Fn(CombatState) -> bool,
        to: CombatState,
        label: &'static str,
    ) -> Result<(), CombatError> {
        let combat = self.combats.last_mut().ok_or(CombatError::NoCombat)?;
        if !from(combat.state) {
            return Err(CombatError::InvalidTransition {
                from: combat.state,
                to: label,
            });
        }
        combat.state = to;
        Ok(())
    }

    /// `Starting → Initializing`.
    ///
    /// # Errors
    /// [`CombatError::InvalidTransition`] from any other state.
    pub fn begin_initialization(&mut self) -> Result<(), CombatError> {
        self.transition(|s| s == CombatState::Starting, CombatState::Initializing, "initializing")
    }

    /// `Initializing → Ongoing`.
    ///
    /// # Errors
    /// [`CombatError::InvalidTransition`] from any other state.
    pub fn begin_ongoing(&mut self) -> Result<(), CombatError> {
        self.transition(|s| s == CombatState::Initializing, CombatState::Ongoing, "ongoing")
    }

    /// `Ongoing → Completed(result)`.
    ///
    /// # Errors
    /// [`CombatError::InvalidTransition`] from any other state.
    pub fn complete(&mut self, result: CombatResult) -> Result<(), CombatError> {
        self.transition(|s| s == CombatState::Ongoing, CombatState::Completed(result), "completed")
    }

    /// `Completed → PostCombat`.
    ///
    /// # Errors
    /// [`CombatError::InvalidTransition`] from any other state.
    pub fn finish_post_combat(&mut self) -> Result<(), CombatError> {
        self.transition(
            |s| matches!(s, CombatState::Completed(_)),
            CombatState::PostCombat,
            "post-combat",
        )
    }

    /// Open a new round with a fixed action order.
    ///
    /// # Errors
    /// [`CombatError::InvalidTransition`] unless ongoing,
    /// [`CombatError::RoundInProgress`] if the latest round is open,
    /// [`CombatError::NoParticipants`] for an empty order.
    pub fn create_round(&mut self, action_order: Vec<String>) -> Result<&Round, CombatError> {
        let combat = self.combats.last_mut().ok_or(CombatError::NoCombat)?;
        if combat.state != CombatState::Ongoing {
            return Err(CombatError::InvalidTransition {
                from: combat.state,
                to: "new round",
            });
        }
        if let Some(open) = combat.rounds.last().filter(|r| !r.completed) {
            return Err(CombatError::RoundInProgress(open.tag.clone()));
        }
        if action_order.is_empty() {
            return Err(CombatError::NoParticipants);
        }
        let tag = format!("{}-round-{}", combat.name, combat.rounds.len() + 1);
        combat.rounds.push(Round::new(tag, action_order));
        Ok(&combat.rounds[combat.rounds.len() - 1])
    }

    /// Record the arbiter's result and close the latest round.
    ///
    /// # Errors
    /// [`CombatError::NoOpenRound`] if there is no open round.
    pub fn complete_round(&mut self, combat_log: String, narrative: String) -> Result<&Round, CombatError> {
        let combat = self.combats.last_mut().ok_or(CombatError::NoCombat)?;
        let round = combat
            .rounds
            .last_mut()
            .filter(|r| !r.completed)
            .ok_or(CombatError::NoOpenRound)?;
        round.combat_log = combat_log;
        round.narrative = narrative;
        round.completed = true;
        Ok(round)
    }

    /// Mark the latest round's boundary as settled. Returns `false` if it
    /// already was.
    ///
    /// # Errors
    /// [`CombatError::NoCombat`] without a combat, [`CombatError::NoOpenRound`]
    /// if the current combat has no rounds yet.
    pub fn settle_latest_round(&mut self) -> Result<bool, CombatError> {
        let combat = self.combats.last_mut().ok_or(CombatError::NoCombat)?;
        let round = combat.rounds.last_mut().ok_or(CombatError::NoOpenRound)?;
        Ok(!std::mem::replace(&mut round.settled, true))
    }
}

// ---------------------------------------------------------------------------
// Participants, ordering, settlement
// ---------------------------------------------------------------------------

/// Actors with combat stats on `stage`, in creation order, dead or alive.
#[must_use]
pub fn participants(world: &World, stage: &str) -> Vec<Entity> {
    let matcher = Matcher::new()
        .all_of::<ActorComponent>()
        .all_of::<CombatStatsComponent>();
    world
        .query(&matcher)
        .into_iter()
        .filter(|&e| world.get::<ActorComponent>(e).is_some_and(|a| a.stage == stage))
        .collect()
}

/// Names of the participants still standing on `stage`, ordered by
/// `strategy`. Anyone at zero hp is left out even before death is marked.
pub fn action_order<R: Rng + ?Sized>(
    world: &World,
    stage: &str,
    strategy: ActionOrderStrategy,
    rng: &mut R,
) -> Vec<String> {
    let mut order: Vec<String> = participants(world, stage)
        .into_iter()
        .filter(|&e| is_standing(world, e))
        .filter_map(|e| world.name(e).map(str::to_string))
        .collect();
    if strategy == ActionOrderStrategy::Random {
        order.shuffle(rng);
    }
    order
}

/// Decrement every effect's duration by one (floored at zero) and drop the
/// ones that ran out. Returns the dropped effects.
pub fn settle_status_effects(effects: &mut Vec<StatusEffect>) -> Vec<StatusEffect> {
    for effect in effects.iter_mut() {
        effect.duration = effect.duration.saturating_sub(1).max(0);
    }
    let (expired, active): (Vec<_>, Vec<_>) = effects.drain(..).partition(|e| e.duration <= 0);
    *effects = active;
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DeathComponent, register_components};
    use agora_core::Destroy;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ongoing() -> CombatSequence {
        let mut seq = CombatSequence::new();
        seq.start_combat("cave", "Cave").unwrap();
        seq.begin_initialization().unwrap();
        seq.begin_ongoing().unwrap();
        seq
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut seq = ongoing();
        seq.create_round(vec!["A".into()]).unwrap();
        seq.complete_round("A waits".into(), "Silence.".into()).unwrap();
        seq.complete(CombatResult::Win).unwrap();
        assert_eq!(seq.completed_result(), Some(CombatResult::Win));
        seq.finish_post_combat().unwrap();
        assert!(seq.is_post_combat());
        seq.start_combat("crypt", "Crypt").unwrap();
        assert!(seq.is_starting());
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut seq = CombatSequence::new();
        assert_eq!(seq.begin_initialization(), Err(CombatError::NoCombat));
        seq.start_combat("cave", "Cave").unwrap();
        assert!(matches!(seq.begin_ongoing(), Err(CombatError::InvalidTransition { .. })));
        assert!(matches!(seq.create_round(vec!["A".into()]), Err(CombatError::InvalidTransition { .. })));
        assert_eq!(
            seq.start_combat("crypt", "Crypt"),
            Err(CombatError::CombatInProgress("cave".into()))
        );
        assert!(seq.is_starting());
    }

    #[test]
    fn duplicate_combat_name() {
        let mut seq = ongoing();
        seq.complete(CombatResult::Lose).unwrap();
        seq.finish_post_combat().unwrap();
        assert_eq!(seq.start_combat("cave", "Cave"), Err(CombatError::DuplicateCombat("cave".into())));
    }

    #[test]
    fn only_one_open_round() {
        let mut seq = ongoing();
        assert_eq!(seq.create_round(vec!["A".into()]).unwrap().tag(), "cave-round-1");
        assert_eq!(
            seq.create_round(vec!["A".into()]).unwrap_err(),
            CombatError::RoundInProgress("cave-round-1".into())
        );
        seq.complete_round(String::new(), String::new()).unwrap();
        assert_eq!(seq.complete_round(String::new(), String::new()).unwrap_err(), CombatError::NoOpenRound);
        assert_eq!(seq.create_round(vec!["A".into()]).unwrap().tag(), "cave-round-2");
        assert_eq!(seq.create_round(vec![]).unwrap_err(), CombatError::RoundInProgress("cave-round-2".into()));
    }

    #[test]
    fn living_order_skips_without_reordering() {
        let mut world = World::new();
        register_components(&mut world).unwrap();
        for name in ["X", "Y", "Z"] {
            let e = world.create(name).unwrap();
            world.set(e, ActorComponent { stage: "Cave".into() }).unwrap();
            world.set(e, CombatStatsComponent::new(10.0, 1.0, 1.0)).unwrap();
        }
        let mut seq = ongoing();
        let order = action_order(&world, "Cave", ActionOrderStrategy::CreationOrder, &mut StdRng::seed_from_u64(1));
        seq.create_round(order).unwrap();

        let y = world.entity_by_name("Y").unwrap();
        world.set(y, Destroy).unwrap();

        let round = seq.latest_round().unwrap();
        assert_eq!(round.action_order(), ["X", "Y", "Z"]);
        let living: Vec<_> = round.living_order(&world).into_iter().map(|e| world.name(e).unwrap().to_string()).collect();
        assert_eq!(living, vec!["X", "Z"]);

        let z = world.entity_by_name("Z").unwrap();
        world.set(z, DeathComponent).unwrap();
        assert_eq!(round.living_order(&world).len(), 1);
    }

    #[test]
    fn random_order_is_a_permutation_of_the_living() {
        let mut world = World::new();
        register_components(&mut world).unwrap();
        for name in ["A", "B", "C", "D", "E"] {
            let e = world.create(name).unwrap();
            world.set(e, ActorComponent { stage: "Cave".into() }).unwrap();
            world.set(e, CombatStatsComponent::new(10.0, 1.0, 1.0)).unwrap();
        }
        let bystander = world.create("Bystander").unwrap();
        world.set(bystander, ActorComponent { stage: "Cave".into() }).unwrap();
        let dead = world.entity_by_name("C").unwrap();
        world.set(dead, DeathComponent).unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let mut order = action_order(&world, "Cave", ActionOrderStrategy::Random, &mut rng);
            order.sort();
            assert_eq!(order, vec!["A", "B", "D", "E"]);
        }
    }

    #[test]
    fn order_leaves_out_fighters_at_zero_hp() {
        let mut world = World::new();
        register_components(&mut world).unwrap();
        for (name, hp) in [("Kael", 30.0), ("Orc", 0.0), ("Goblin", 10.0), ("Wisp", -2.0)] {
            let e = world.create(name).unwrap();
            world.set(e, ActorComponent { stage: "Cave".into() }).unwrap();
            world.set(e, CombatStatsComponent::new(hp, 1.0, 1.0)).unwrap();
        }
        let order = action_order(&world, "Cave", ActionOrderStrategy::CreationOrder, &mut StdRng::seed_from_u64(3));
        assert_eq!(order, vec!["Kael", "Goblin"]);
    }

    #[test]
    fn a_round_boundary_is_settled_once() {
        let mut seq = CombatSequence::new();
        assert_eq!(seq.settle_latest_round(), Err(CombatError::NoCombat));
        seq.start_combat("cave", "Cave").unwrap();
        seq.begin_initialization().unwrap();
        seq.begin_ongoing().unwrap();
        assert_eq!(seq.settle_latest_round(), Err(CombatError::NoOpenRound));

        seq.create_round(vec!["A".into()]).unwrap();
        assert!(!seq.latest_round().unwrap().is_settled());
        assert_eq!(seq.settle_latest_round(), Ok(true));
        assert_eq!(seq.settle_latest_round(), Ok(false));
        assert!(seq.latest_round().unwrap().is_settled());

        let restored: CombatSequence = serde_json::from_str(&serde_json::to_string(&seq).unwrap()).unwrap();
        assert!(restored.latest_round().unwrap().is_settled());

        seq.complete_round(String::new(), String::new()).unwrap();
        seq.create_round(vec!["A".into()]).unwrap();
        assert_eq!(seq.settle_latest_round(), Ok(true));
    }

    #[test]
    fn settlement_decrements_and_removes() {
        let mut effects = vec![
            StatusEffect::new("Burning", "fire", 1),
            StatusEffect::new("Blessed", "light", 3),
            StatusEffect::new("Stale", "already out", 0),
        ];
        let expired = settle_status_effects(&mut effects);
        assert_eq!(effects, vec![StatusEffect::new("Blessed", "light", 2)]);
        let names: Vec<_> = expired.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Burning", "Stale"]);
        assert!(settle_status_effects(&mut Vec::new()).is_empty());
    }
}
