//! Fixtures shared by the inline test modules.

use std::sync::Arc;

use agora_core::{Entity, WorldContext};
use agora_llm::ScriptedDecisions;

use crate::components::{
    ActorComponent, AllyComponent, CombatStatsComponent, DungeonComponent, EnemyComponent, StageComponent,
};
use crate::config::{ActionOrderStrategy, GameConfig};
use crate::context::GameContext;

pub(crate) fn config() -> GameConfig {
    let mut config = GameConfig::default();
    config.general.seed = Some(7);
    config.combat.action_order = ActionOrderStrategy::CreationOrder;
    config
}

pub(crate) fn context_with(script: ScriptedDecisions) -> GameContext {
    GameContext::new(config(), Arc::new(script)).unwrap()
}

/// A context holding one dungeon stage, `Cave`.
pub(crate) fn dungeon_context_with(script: ScriptedDecisions) -> GameContext {
    let mut ctx = context_with(script);
    let cave = ctx.world_mut().create("Cave").unwrap();
    ctx.world_mut()
        .set(cave, StageComponent { description: "A damp cave.".into() })
        .unwrap();
    ctx.world_mut().set(cave, DungeonComponent).unwrap();
    ctx.set_persona("Cave", "You are the arbiter of the cave.");
    ctx
}

pub(crate) fn dungeon_context() -> GameContext {
    dungeon_context_with(ScriptedDecisions::new())
}

/// An actor in `Cave` with the given hp out of 30.
pub(crate) fn spawn_fighter(ctx: &mut GameContext, name: &str, ally: bool, hp: f64) -> Entity {
    let entity = ctx.world_mut().create(name).unwrap();
    let mut stats = CombatStatsComponent::new(30.0, 5.0, 2.0);
    stats.hp = hp;
    ctx.world_mut().set(entity, ActorComponent { stage: "Cave".into() }).unwrap();
    ctx.world_mut().set(entity, stats).unwrap();
    if ally {
        ctx.world_mut().set(entity, AllyComponent).unwrap();
    } else {
        ctx.world_mut().set(entity, EnemyComponent).unwrap();
    }
    ctx.set_persona(name, format!("You are {name}."));
    entity
}

/// Start `name` in `Cave` and move it straight to ongoing.
pub(crate) fn ongoing_combat(ctx: &mut GameContext, name: &str) {
    let combat = ctx.combat_mut();
    combat.start_combat(name, "Cave").unwrap();
    combat.begin_initialization().unwrap();
    combat.begin_ongoing().unwrap();
}
