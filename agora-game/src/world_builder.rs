//! World bootstrap: stages, actors and social deduction roles.
//!
//! A world can be described in TOML and built in one call:
//!
//! ```toml
//! [[stages]]
//! name = "Tavern"
//! kind = "home"
//! description = "A warm tavern."
//!
//! [[actors]]
//! name = "Kael"
//! stage = "Tavern"
//! persona = "You are Kael, a hired sword."
//! side = "ally"
//! stats = { max_hp = 30.0, attack = 6.0, defense = 3.0 }
//! kick_off = "You wake up in the tavern."
//! ```

use agora_core::{Entity, WorldContext};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::components::{
    ActorComponent, AllyComponent, CombatStatsComponent, DungeonComponent, EnemyComponent, HomeComponent,
    KickOffComponent, PlayerComponent, SeerComponent, SocialPlayerComponent, StageComponent, VillagerComponent,
    WerewolfComponent,
};
use crate::context::GameContext;
use crate::error::{GameError, Result};
use crate::events;

/// What a stage is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Free time.
    Home,
    /// Combat.
    Dungeon,
}

/// Combat side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The player's party.
    Ally,
    /// The opposition.
    Enemy,
}

/// Starting combat numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSpec {
    /// Maximum and starting hp.
    pub max_hp: f64,
    /// Attack rating.
    pub attack: f64,
    /// Defense rating.
    pub defense: f64,
}

/// A stage to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Unique name.
    pub name: String,
    /// Home or dungeon.
    pub kind: StageKind,
    /// What the place looks like.
    pub description: String,
    /// System message of the stage's own history. Dungeons use it as the
    /// arbiter persona.
    #[serde(default)]
    pub persona: Option<String>,
}

/// An actor to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSpec {
    /// Unique name.
    pub name: String,
    /// Name of the stage it starts on.
    pub stage: String,
    /// System message of its history.
    pub persona: String,
    /// Combat side, if it fights.
    #[serde(default)]
    pub side: Option<Side>,
    /// Combat numbers, if it fights.
    #[serde(default)]
    pub stats: Option<StatsSpec>,
    /// Opening message, delivered once.
    #[serde(default)]
    pub kick_off: Option<String>,
    /// Human controlling it, if any.
    #[serde(default)]
    pub player: Option<String>,
}

/// A whole world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSpec {
    /// Stages, spawned first.
    #[serde(default)]
    pub stages: Vec<StageSpec>,
    /// Actors, spawned after every stage.
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
}

impl WorldSpec {
    /// Parse a world from a TOML string.
    ///
    /// # Errors
    /// [`GameError::Config`] if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| GameError::Config(e.to_string()))
    }

    /// A small world with a tavern, a goblin cave, two heroes and a goblin.
    #[must_use]
    pub fn demo() -> Self {
        let fighter = |name: &str, stage: &str, side: Side, max_hp: f64| ActorSpec {
            name: name.to_string(),
            stage: stage.to_string(),
            persona: format!("You are {name}."),
            side: Some(side),
            stats: Some(StatsSpec {
                max_hp,
                attack: 5.0,
                defense: 2.0,
            }),
            kick_off: None,
            player: None,
        };
        let mut kael = fighter("Kael", "Tavern", Side::Ally, 30.0);
        kael.persona = "You are Kael, a sellsword who talks little and fights hard.".into();
        kael.kick_off = Some("You sit at the corner table, nursing a drink.".into());
        let mut mira = fighter("Mira", "Tavern", Side::Ally, 24.0);
        mira.persona = "You are Mira, a healer who hates to see anyone hurt.".into();
        mira.kick_off = Some("You arrive at the tavern after a long journey.".into());
        let mut goblin = fighter("Goblin", "Goblin Cave", Side::Enemy, 12.0);
        goblin.persona = "You are a cunning goblin guarding your cave.".into();
        Self {
            stages: vec![
                StageSpec {
                    name: "Tavern".into(),
                    kind: StageKind::Home,
                    description: "A warm tavern full of rumors.".into(),
                    persona: None,
                },
                StageSpec {
                    name: "Goblin Cave".into(),
                    kind: StageKind::Dungeon,
                    description: "A damp cave that smells of smoke.".into(),
                    persona: Some("You are the impartial arbiter of fights in the Goblin Cave.".into()),
                },
            ],
            actors: vec![kael, mira, goblin],
        }
    }
}

/// Spawn a stage.
///
/// # Errors
/// Propagates a duplicate name.
pub fn spawn_stage(ctx: &mut GameContext, spec: &StageSpec) -> Result<Entity> {
    let world = ctx.world_mut();
    let stage = world.create(spec.name.as_str())?;
    world.set(
        stage,
        StageComponent {
            description: spec.description.clone(),
        },
    )?;
    match spec.kind {
        StageKind::Home => world.set(stage, HomeComponent)?,
        StageKind::Dungeon => world.set(stage, DungeonComponent)?,
    }
    if let Some(persona) = &spec.persona {
        ctx.set_persona(&spec.name, persona.as_str());
    }
    Ok(stage)
}

/// Spawn an actor on an existing stage.
///
/// # Errors
/// [`GameError::Unknown`] if the stage does not exist; propagates a
/// duplicate name.
pub fn spawn_actor(ctx: &mut GameContext, spec: &ActorSpec) -> Result<Entity> {
    if ctx.world().entity_by_name(&spec.stage).is_none() {
        return Err(GameError::Unknown {
            kind: "stage",
            name: spec.stage.clone(),
        });
    }
    let world = ctx.world_mut();
    let actor = world.create(spec.name.as_str())?;
    world.set(
        actor,
        ActorComponent {
            stage: spec.stage.clone(),
        },
    )?;
    match spec.side {
        Some(Side::Ally) => world.set(actor, AllyComponent)?,
        Some(Side::Enemy) => world.set(actor, EnemyComponent)?,
        None => {}
    }
    if let Some(stats) = spec.stats {
        world.set(actor, CombatStatsComponent::new(stats.max_hp, stats.attack, stats.defense))?;
    }
    if let Some(message) = &spec.kick_off {
        world.set(
            actor,
            KickOffComponent {
                message: message.clone(),
            },
        )?;
    }
    if let Some(player) = &spec.player {
        world.set(
            actor,
            PlayerComponent {
                player: player.clone(),
            },
        )?;
    }
    ctx.set_persona(&spec.name, spec.persona.as_str());
    Ok(actor)
}

/// Spawn every stage, then every actor.
///
/// # Errors
/// The first spawn failure. Entities spawned before it stay.
pub fn build_world(ctx: &mut GameContext, spec: &WorldSpec) -> Result<()> {
    for stage in &spec.stages {
        spawn_stage(ctx, stage)?;
    }
    for actor in &spec.actors {
        spawn_actor(ctx, actor)?;
    }
    info!(stages = spec.stages.len(), actors = spec.actors.len(), "world built");
    Ok(())
}

/// Seat `players` at the social deduction table with shuffled secret roles:
/// the configured number of werewolves, one seer if enabled, villagers for
/// the rest. Every player is told its role; werewolves also learn each
/// other.
///
/// # Errors
/// [`GameError::Unknown`] for a name that is not an entity,
/// [`GameError::Config`] if there are not enough players for the roles.
pub fn assign_roles<S: AsRef<str>>(ctx: &mut GameContext, players: &[S]) -> Result<()> {
    let mut seats = Vec::with_capacity(players.len());
    for name in players {
        let name = name.as_ref();
        let entity = ctx.world().entity_by_name(name).ok_or_else(|| GameError::Unknown {
            kind: "actor",
            name: name.to_string(),
        })?;
        seats.push((name.to_string(), entity));
    }
    let wolves = ctx.config().social.werewolf_count;
    let seer = usize::from(ctx.config().social.with_seer);
    if wolves == 0 || wolves + seer >= seats.len() {
        return Err(GameError::Config(format!(
            "{} players cannot seat {wolves} werewolves and {seer} seer",
            seats.len()
        )));
    }
    seats.shuffle(ctx.rng());

    let pack: Vec<String> = seats[..wolves].iter().map(|(name, _)| name.clone()).collect();
    for (index, (name, entity)) in seats.iter().enumerate() {
        let world = ctx.world_mut();
        world.remove::<WerewolfComponent>(*entity)?;
        world.remove::<SeerComponent>(*entity)?;
        world.remove::<VillagerComponent>(*entity)?;
        world.set(*entity, SocialPlayerComponent)?;
        let (role, hint) = if index < wolves {
            world.set(*entity, WerewolfComponent)?;
            let others: Vec<&str> = pack.iter().map(String::as_str).filter(|w| *w != name.as_str()).collect();
            let hint = if others.is_empty() {
                "You hunt alone.".to_string()
            } else {
                format!("Your fellow werewolves: {}.", others.join(", "))
            };
            ("werewolf", hint)
        } else if index < wolves + seer {
            world.set(*entity, SeerComponent)?;
            ("seer", "You side with the villagers and see more than most.".to_string())
        } else {
            world.set(*entity, VillagerComponent)?;
            ("villager", "Find the werewolves before they find you.".to_string())
        };
        ctx.notify(name, events::role_reveal(role, &hint));
    }
    info!(players = seats.len(), werewolves = wolves, "roles assigned");
    Ok(())
}
