//! Game components.
//!
//! All of them are behaviorless values. Stages and actors reference each
//! other by name, never by handle, so snapshots stay meaningful across a
//! save and a restore.

use std::collections::BTreeMap;

use agora_core::{World, component};
use serde::{Deserialize, Serialize};

use crate::models::{Card, StatusEffect};

// ---------------------------------------------------------------------------
// Places and people
// ---------------------------------------------------------------------------

/// A place actors can be in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageComponent {
    /// What the place looks like.
    pub description: String,
}
component!(StageComponent);

/// Marks a stage as a home (free-roam) stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeComponent;
component!(HomeComponent);

/// Marks a stage as a dungeon (combat) stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonComponent;
component!(DungeonComponent);

/// An agent, located on a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorComponent {
    /// Name of the stage entity the actor is on.
    pub stage: String,
}
component!(ActorComponent);

/// The player's side in combat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllyComponent;
component!(AllyComponent);

/// The opposing side in combat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyComponent;
component!(EnemyComponent);

/// Driven by a human through the host instead of the decision service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerComponent {
    /// Account or seat name of the human.
    pub player: String,
}
component!(PlayerComponent);

/// Combat numbers and active status effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStatsComponent {
    /// Current hit points.
    pub hp: f64,
    /// Maximum hit points.
    pub max_hp: f64,
    /// Attack rating.
    pub attack: f64,
    /// Defense rating.
    pub defense: f64,
    /// Active status effects.
    #[serde(default)]
    pub status_effects: Vec<StatusEffect>,
}
component!(CombatStatsComponent);

impl CombatStatsComponent {
    /// Full-health stats without effects.
    #[must_use]
    pub fn new(max_hp: f64, attack: f64, defense: f64) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            attack,
            defense,
            status_effects: Vec::new(),
        }
    }

    /// `Name.HP=X/Y`, the format combat logs use.
    #[must_use]
    pub fn hp_line(&self, name: &str) -> String {
        format!("{name}.HP={}/{}", self.hp, self.max_hp)
    }
}

/// Dead. Excluded from action orders, faction counts and votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathComponent;
component!(DeathComponent);

// ---------------------------------------------------------------------------
// Kick-off
// ---------------------------------------------------------------------------

/// Opening message an actor receives once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickOffComponent {
    /// The message.
    pub message: String,
}
component!(KickOffComponent);

/// The kick-off message was delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickOffDoneComponent {
    /// What the actor replied. Empty when the request failed.
    pub response: String,
}
component!(KickOffDoneComponent);

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

/// Cards drawn for the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandComponent {
    /// The cards.
    pub cards: Vec<Card>,
}
component!(HandComponent);

/// Queued by the host: draw cards this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawCardsAction;
component!(DrawCardsAction);

/// Queued by the host: commit `card` this round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayCardsAction {
    /// The committed card.
    pub card: Card,
}
component!(PlayCardsAction);

/// Placed on the dungeon stage once cards are committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationAction;
component!(ArbitrationAction);

// ---------------------------------------------------------------------------
// Home
// ---------------------------------------------------------------------------

/// Lines to deliver to specific listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakAction {
    /// Listener name to line.
    pub lines: BTreeMap<String, String>,
}
component!(SpeakAction);

/// A line for everyone on the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceAction {
    /// The line.
    pub line: String,
}
component!(AnnounceAction);

// ---------------------------------------------------------------------------
// Social deduction
// ---------------------------------------------------------------------------

/// Seat at the social deduction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPlayerComponent;
component!(SocialPlayerComponent);

/// Secret role: werewolf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WerewolfComponent;
component!(WerewolfComponent);

/// Secret role: seer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeerComponent;
component!(SeerComponent);

/// Secret role: plain villager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VillagerComponent;
component!(VillagerComponent);

/// Placed on the night's victim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WolfKillAction {
    /// Night of the kill.
    pub night: u32,
}
component!(WolfKillAction);

/// Register every game component. Idempotent.
///
/// # Errors
/// Propagates a registry name clash.
pub fn register_components(world: &mut World) -> agora_core::Result<()> {
    world.register::<StageComponent>()?;
    world.register::<HomeComponent>()?;
    world.register::<DungeonComponent>()?;
    world.register::<ActorComponent>()?;
    world.register::<AllyComponent>()?;
    world.register::<EnemyComponent>()?;
    world.register::<PlayerComponent>()?;
    world.register::<CombatStatsComponent>()?;
    world.register::<DeathComponent>()?;
    world.register::<KickOffComponent>()?;
    world.register::<KickOffDoneComponent>()?;
    world.register::<HandComponent>()?;
    world.register::<DrawCardsAction>()?;
    world.register::<PlayCardsAction>()?;
    world.register::<ArbitrationAction>()?;
    world.register::<SpeakAction>()?;
    world.register::<AnnounceAction>()?;
    world.register::<SocialPlayerComponent>()?;
    world.register::<WerewolfComponent>()?;
    world.register::<SeerComponent>()?;
    world.register::<VillagerComponent>()?;
    world.register::<WolfKillAction>()?;
    Ok(())
}

/// Neither dead nor marked for destruction.
#[must_use]
pub fn is_alive(world: &World, entity: agora_core::Entity) -> bool {
    world.contains(entity)
        && !world.has::<DeathComponent>(entity)
        && !world.has::<agora_core::Destroy>(entity)
}

/// Alive and above zero hp. A fighter the arbiter just knocked down is not
/// standing even before its death is marked.
#[must_use]
pub fn is_standing(world: &World, entity: agora_core::Entity) -> bool {
    is_alive(world, entity)
        && world
            .get::<CombatStatsComponent>(entity)
            .is_some_and(|stats| stats.hp > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::Destroy;

    #[test]
    fn registration_is_idempotent() {
        let mut world = World::new();
        register_components(&mut world).unwrap();
        let count = world.registry().len();
        register_components(&mut world).unwrap();
        assert_eq!(world.registry().len(), count);
        assert!(world.registry().lookup("CombatStatsComponent").is_some());
    }

    #[test]
    fn alive_excludes_dead_and_doomed() {
        let mut world = World::new();
        let a = world.create("A").unwrap();
        let b = world.create("B").unwrap();
        let c = world.create("C").unwrap();
        world.set(b, DeathComponent).unwrap();
        world.set(c, Destroy).unwrap();
        assert!(is_alive(&world, a));
        assert!(!is_alive(&world, b));
        assert!(!is_alive(&world, c));
    }
}
