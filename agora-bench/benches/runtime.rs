//! Agora Benchmark Suite
//!
//! Budgets the runtime is expected to hold:
//!   group_maintenance_1000_entities ... < 1ms
//!   query_allies_from_1000 ........... < 50μs
//!   dungeon_round_scripted .......... < 2ms

use std::collections::BTreeMap;
use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use agora_core::{Matcher, World, WorldContext};
use agora_game::components::{
    ActorComponent, AllyComponent, CombatStatsComponent, DeathComponent, DrawCardsAction, EnemyComponent,
    register_components,
};
use agora_game::config::ActionOrderStrategy;
use agora_game::{Game, GameConfig, WorldSpec};
use agora_llm::ScriptedDecisions;

fn populated_world(count: usize) -> World {
    let mut world = World::new();
    register_components(&mut world).expect("register components");
    for i in 0..count {
        let e = world.create(format!("npc-{i}")).expect("create entity");
        world
            .set(e, ActorComponent { stage: format!("stage-{}", i % 8) })
            .expect("set actor");
        world
            .set(e, CombatStatsComponent::new(20.0, 3.0, 1.0))
            .expect("set stats");
        if i % 2 == 0 {
            world.set(e, AllyComponent).expect("set ally");
        } else {
            world.set(e, EnemyComponent).expect("set enemy");
        }
    }
    world
}

/// Toggle a marker on every entity while three groups are subscribed.
fn bench_group_maintenance(c: &mut Criterion) {
    let mut world = populated_world(1000);
    for matcher in [
        Matcher::new().all_of::<ActorComponent>().none_of::<DeathComponent>(),
        Matcher::new().all_of::<DrawCardsAction>(),
        Matcher::new().any_of::<AllyComponent>().any_of::<EnemyComponent>(),
    ] {
        world.subscribe(matcher).expect("subscribe");
    }
    let entities: Vec<_> = world.entities().collect();

    c.bench_function("group_maintenance_1000_entities", |b| {
        b.iter(|| {
            for &e in &entities {
                world.set(e, DrawCardsAction).expect("set");
            }
            for &e in &entities {
                world.remove::<DrawCardsAction>(e).expect("remove");
            }
            world.drain_events();
        });
    });
}

/// Query served from a subscribed group.
fn bench_query(c: &mut Criterion) {
    let mut world = populated_world(1000);
    let allies = Matcher::new().all_of::<AllyComponent>().none_of::<DeathComponent>();
    world.subscribe(allies.clone()).expect("subscribe");

    c.bench_function("query_allies_from_1000", |b| {
        b.iter(|| black_box(world.query(black_box(&allies))));
    });
}

const ARENA: &str = r#"
[[stages]]
name = "Arena"
kind = "dungeon"
description = "Sand and blood."

[[actors]]
name = "Kael"
stage = "Arena"
persona = "You are Kael."
side = "ally"
stats = { max_hp = 30.0, attack = 6.0, defense = 3.0 }

[[actors]]
name = "Brute"
stage = "Arena"
persona = "You are Brute."
side = "enemy"
stats = { max_hp = 40.0, attack = 5.0, defense = 2.0 }
"#;

/// One complete combat round through the dungeon pipeline with instant
/// scripted decisions: initialization, draw, play and arbitration.
fn bench_dungeon_round(c: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let spec = WorldSpec::from_toml(ARENA).expect("arena spec");
    let mut config = GameConfig::default();
    config.general.seed = Some(1);
    config.combat.action_order = ActionOrderStrategy::CreationOrder;

    let fresh_game = || {
        let script = ScriptedDecisions::new()
            .on("Combat begins", r#"{"status_effects": []}"#)
            .on("create your", r#"{"cards": [{"name": "Jab", "description": "1 damage", "targets": ["Brute"]}]}"#)
            .on("resolve the fight", r#"{"combat_log": "Jab lands.", "narrative": "A quick exchange."}"#);
        let mut game = Game::new(config.clone(), Arc::new(script)).expect("game");
        game.build_world(&spec).expect("world");
        game
    };

    c.bench_function("dungeon_round_scripted", |b| {
        b.iter_batched(
            fresh_game,
            |mut game| {
                runtime.block_on(async {
                    game.enter_dungeon("Arena", &["Kael"]).await.expect("enter");
                    game.tick().await.expect("init tick");
                    game.queue_draw_cards().expect("draw");
                    game.tick().await.expect("draw tick");
                    game.queue_play_cards(&BTreeMap::new()).expect("play");
                    game.tick().await.expect("arbitration tick");
                });
                black_box(game.context().combat().round_count());
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_group_maintenance, bench_query, bench_dungeon_round);
criterion_main!(benches);
