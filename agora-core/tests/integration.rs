//! Integration Tests: Pipeline Tick Semantics
//!
//! These tests drive complete pipelines over a bare `World` context:
//! phase ordering, intra-tick visibility, continuations, deferred
//! destruction and subscription release on shutdown.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use agora_core::{
    Continuation, Destroy, DestroyProcessor, EcsError, Entity, Matcher, Pipeline, Processor,
    Trigger, World, component,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Health {
    hp: i32,
}
component!(Health);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Spark;
component!(Spark);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Flame;
component!(Flame);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Answer(String);
component!(Answer);

#[derive(Debug, Clone, PartialEq)]
struct Ghost;
component!(Ghost);

type Journal = Arc<Mutex<Vec<String>>>;

fn world() -> World {
    let mut world = World::new();
    world.register::<Health>().unwrap();
    world.register::<Spark>().unwrap();
    world.register::<Flame>().unwrap();
    world.register::<Answer>().unwrap();
    world
}

fn names(world: &World, entities: &[Entity]) -> Vec<String> {
    entities
        .iter()
        .filter_map(|e| world.name(*e).map(str::to_string))
        .collect()
}

// ---------------------------------------------------------------------------
// Test processors
// ---------------------------------------------------------------------------

/// Execute: attaches `Spark` to every entity named in `targets`, once.
struct Ignite {
    targets: Vec<&'static str>,
}

impl Processor<World> for Ignite {
    fn name(&self) -> &'static str {
        "ignite"
    }

    fn execute(&mut self, world: &mut World) -> agora_core::Result<()> {
        for name in self.targets.drain(..) {
            if let Some(entity) = world.entity_by_name(name) {
                world.set(entity, Spark)?;
            }
        }
        Ok(())
    }
}

/// Reactive on `Spark` added: turns each spark into a `Flame`.
struct Spread {
    journal: Journal,
}

impl Processor<World> for Spread {
    fn name(&self) -> &'static str {
        "spread"
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(Matcher::new().all_of::<Spark>()))
    }

    fn react(&mut self, world: &mut World, entities: Vec<Entity>) -> agora_core::Result<()> {
        self.journal
            .lock()
            .push(format!("spread:{}", names(world, &entities).join(",")));
        for entity in entities {
            world.set(entity, Flame)?;
        }
        Ok(())
    }
}

/// Reactive on `Flame` added: records what it saw.
struct Watch {
    label: &'static str,
    journal: Journal,
}

impl Processor<World> for Watch {
    fn name(&self) -> &'static str {
        self.label
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(Matcher::new().all_of::<Flame>()))
    }

    fn react(&mut self, world: &mut World, entities: Vec<Entity>) -> agora_core::Result<()> {
        self.journal
            .lock()
            .push(format!("{}:{}", self.label, names(world, &entities).join(",")));
        Ok(())
    }
}

/// Records each tick boundary.
struct Clock {
    journal: Journal,
    tick: u32,
}

impl Processor<World> for Clock {
    fn execute(&mut self, _world: &mut World) -> agora_core::Result<()> {
        self.tick += 1;
        self.journal.lock().push(format!("tick{}", self.tick));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ordering contract
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reactive_sees_earlier_processors_in_same_tick() {
    let journal: Journal = Arc::default();
    let mut world = world();
    world.create("A").unwrap();
    world.create("B").unwrap();

    let mut pipeline = Pipeline::new("ordering")
        .with(Clock { journal: journal.clone(), tick: 0 })
        .with(Ignite { targets: vec!["A", "B"] })
        .with(Watch { label: "early", journal: journal.clone() })
        .with(Spread { journal: journal.clone() })
        .with(Watch { label: "late", journal: journal.clone() });

    pipeline.activate(&mut world).unwrap();
    pipeline.process_tick(&mut world).await.unwrap();
    pipeline.process_tick(&mut world).await.unwrap();

    // "late" is registered after "spread" and sees its flames in tick 1;
    // "early" is registered before it and gets them on tick 2.
    assert_eq!(
        *journal.lock(),
        vec!["tick1", "spread:A,B", "late:A,B", "tick2", "early:A,B"]
    );
}

#[tokio::test]
async fn reentrant_flip_is_still_delivered() {
    struct Flicker;
    impl Processor<World> for Flicker {
        fn execute(&mut self, world: &mut World) -> agora_core::Result<()> {
            let Some(a) = world.entity_by_name("A") else {
                return Ok(());
            };
            world.set(a, Flame)?;
            world.remove::<Flame>(a)?;
            Ok(())
        }
    }

    let journal: Journal = Arc::default();
    let mut world = world();
    world.create("A").unwrap();
    let mut pipeline = Pipeline::new("flicker")
        .with(Flicker)
        .with(Watch { label: "watch", journal: journal.clone() });
    pipeline.activate(&mut world).unwrap();
    pipeline.process_tick(&mut world).await.unwrap();

    assert_eq!(*journal.lock(), vec!["watch:A"]);
}

#[tokio::test]
async fn filter_gates_the_batch() {
    struct OnlyAlive {
        seen: Journal,
    }
    impl Processor<World> for OnlyAlive {
        fn trigger(&self) -> Option<Trigger> {
            Some(Trigger::added(Matcher::new().all_of::<Flame>()))
        }
        fn filter(&self, world: &World, entity: Entity) -> bool {
            world.get::<Health>(entity).is_some_and(|h| h.hp > 0)
        }
        fn react(&mut self, world: &mut World, entities: Vec<Entity>) -> agora_core::Result<()> {
            self.seen.lock().extend(names(world, &entities));
            Ok(())
        }
    }

    let seen: Journal = Arc::default();
    let mut world = world();
    let a = world.create("A").unwrap();
    let b = world.create("B").unwrap();
    world.set(a, Health { hp: 3 }).unwrap();
    world.set(b, Health { hp: 0 }).unwrap();

    let mut pipeline = Pipeline::new("filter").with(OnlyAlive { seen: seen.clone() });
    pipeline.activate(&mut world).unwrap();
    world.set(a, Flame).unwrap();
    world.set(b, Flame).unwrap();
    pipeline.process_tick(&mut world).await.unwrap();

    assert_eq!(*seen.lock(), vec!["A"]);
}

// ---------------------------------------------------------------------------
// Continuations
// ---------------------------------------------------------------------------

/// Reactive on `Spark`: snapshots names, answers after `delay`.
struct SlowOracle {
    label: &'static str,
    delay: Duration,
    pending: Vec<String>,
    journal: Journal,
}

impl Processor<World> for SlowOracle {
    fn name(&self) -> &'static str {
        self.label
    }

    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::added(Matcher::new().all_of::<Spark>()))
    }

    fn react(&mut self, world: &mut World, entities: Vec<Entity>) -> agora_core::Result<()> {
        self.pending = names(world, &entities);
        Ok(())
    }

    fn resolve(&mut self, _world: &World) -> Option<Continuation<World>> {
        if self.pending.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.pending);
        let delay = self.delay;
        let label = self.label;
        let journal = self.journal.clone();
        Some(Box::pin(async move {
            let answers = futures::future::join_all(batch.into_iter().map(|name| async move {
                tokio::time::sleep(delay).await;
                name
            }))
            .await;
            Box::new(move |world: &mut World| {
                for name in answers {
                    // Re-fetch: the entity may be gone by now.
                    let Some(entity) = world.entity_by_name(&name) else {
                        continue;
                    };
                    world.set(entity, Answer(format!("{label}:{name}")))?;
                    journal.lock().push(format!("{label}:{name}"));
                }
                Ok(())
            }) as agora_core::Effect<World>
        }))
    }
}

#[tokio::test(start_paused = true)]
async fn continuations_run_concurrently_and_apply_in_order() {
    let journal: Journal = Arc::default();
    let mut world = world();
    world.create("A").unwrap();
    world.create("B").unwrap();

    let mut pipeline = Pipeline::new("oracles")
        .with(Ignite { targets: vec!["A", "B"] })
        .with(SlowOracle {
            label: "slow",
            delay: Duration::from_millis(200),
            pending: Vec::new(),
            journal: journal.clone(),
        })
        .with(SlowOracle {
            label: "fast",
            delay: Duration::from_millis(100),
            pending: Vec::new(),
            journal: journal.clone(),
        });
    pipeline.activate(&mut world).unwrap();

    let start = tokio::time::Instant::now();
    pipeline.process_tick(&mut world).await.unwrap();
    let elapsed = start.elapsed();

    // Four requests in two batches; joined, the tick costs the slowest one.
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(300));

    // "fast" finished first but "slow" is registered first.
    assert_eq!(*journal.lock(), vec!["slow:A", "slow:B", "fast:A", "fast:B"]);
    let a = world.entity_by_name("A").unwrap();
    assert_eq!(world.get::<Answer>(a), Some(&Answer("fast:A".into())));
}

#[tokio::test]
async fn effect_skips_entities_destroyed_while_waiting() {
    struct Doom;
    impl Processor<World> for Doom {
        fn execute(&mut self, world: &mut World) -> agora_core::Result<()> {
            if let Some(b) = world.entity_by_name("B") {
                world.set(b, Destroy)?;
            }
            Ok(())
        }
    }

    let journal: Journal = Arc::default();
    let mut world = world();
    world.create("A").unwrap();
    world.create("B").unwrap();

    let mut pipeline = Pipeline::new("doom")
        .with(Ignite { targets: vec!["A", "B"] })
        .with(SlowOracle {
            label: "oracle",
            delay: Duration::from_millis(1),
            pending: Vec::new(),
            journal: journal.clone(),
        })
        .with(Doom)
        .with(DestroyProcessor);
    pipeline.activate(&mut world).unwrap();
    pipeline.process_tick(&mut world).await.unwrap();

    // B is still observable while continuations apply; gone after cleanup.
    assert_eq!(*journal.lock(), vec!["oracle:A", "oracle:B"]);
    assert!(world.entity_by_name("B").is_none());
    assert!(world.entity_by_name("A").is_some());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initialize_runs_once_and_shutdown_releases_groups() {
    struct Boot {
        count: Arc<Mutex<u32>>,
    }
    impl Processor<World> for Boot {
        fn initialize(&mut self, _world: &mut World) -> agora_core::Result<()> {
            *self.count.lock() += 1;
            Ok(())
        }
    }

    let count = Arc::new(Mutex::new(0));
    let journal: Journal = Arc::default();
    let mut world = world();
    let mut pipeline = Pipeline::new("life")
        .with(Boot { count: count.clone() })
        .with(Watch { label: "one", journal: journal.clone() })
        .with(Watch { label: "two", journal: journal.clone() })
        .with(Spread { journal: journal.clone() });

    pipeline.activate(&mut world).unwrap();
    pipeline.activate(&mut world).unwrap();
    assert_eq!(world.subscription_count(), 3);
    assert_eq!(world.group_count(), 2);

    pipeline.initialize(&mut world).await.unwrap();
    pipeline.process_tick(&mut world).await.unwrap();
    assert_eq!(*count.lock(), 1);
    assert_eq!(pipeline.tick_count(), 1);

    pipeline.shutdown(&mut world).unwrap();
    assert!(!pipeline.is_active());
    assert_eq!(world.subscription_count(), 0);
    assert_eq!(world.group_count(), 0);

    // Inactive pipelines ignore ticks.
    pipeline.process_tick(&mut world).await.unwrap();
    assert_eq!(pipeline.tick_count(), 1);
}

#[tokio::test]
async fn initialize_is_ignored_when_inactive_or_repeated() {
    struct Boot {
        count: Arc<Mutex<u32>>,
    }
    impl Processor<World> for Boot {
        fn initialize(&mut self, _world: &mut World) -> agora_core::Result<()> {
            *self.count.lock() += 1;
            Ok(())
        }
    }

    let count = Arc::new(Mutex::new(0));
    let mut world = world();
    let mut pipeline = Pipeline::new("boot").with(Boot { count: count.clone() });

    pipeline.initialize(&mut world).await.unwrap();
    assert_eq!(*count.lock(), 0);
    assert!(!pipeline.is_initialized());

    pipeline.activate(&mut world).unwrap();
    pipeline.initialize(&mut world).await.unwrap();
    pipeline.initialize(&mut world).await.unwrap();
    assert_eq!(*count.lock(), 1);
    assert!(pipeline.is_initialized());

    // A fresh activation allows one more initialize.
    pipeline.shutdown(&mut world).unwrap();
    assert!(!pipeline.is_initialized());
    pipeline.activate(&mut world).unwrap();
    pipeline.initialize(&mut world).await.unwrap();
    pipeline.initialize(&mut world).await.unwrap();
    assert_eq!(*count.lock(), 2);
}

#[tokio::test]
async fn failing_effect_does_not_drop_later_effects() {
    /// Resolve: an effect that sets `Health` on `target`, failing unless the
    /// target carries a `Spark`.
    struct Heal {
        target: &'static str,
        hp: i32,
        done: bool,
    }
    impl Processor<World> for Heal {
        fn resolve(&mut self, _world: &World) -> Option<Continuation<World>> {
            if std::mem::replace(&mut self.done, true) {
                return None;
            }
            let (target, hp) = (self.target, self.hp);
            Some(Box::pin(async move {
                Box::new(move |world: &mut World| {
                    let Some(entity) = world.entity_by_name(target) else {
                        return Ok(());
                    };
                    world.try_get::<Spark>(entity)?;
                    world.set(entity, Health { hp })
                }) as agora_core::Effect<World>
            }))
        }
    }

    let mut world = world();
    let alice = world.create("alice").unwrap();
    let carol = world.create("carol").unwrap();
    let bob = world.create("bob").unwrap();
    world.set(alice, Spark).unwrap();
    world.set(bob, Spark).unwrap();
    let mut pipeline = Pipeline::new("heal")
        .with(Heal { target: "alice", hp: 1, done: false })
        .with(Heal { target: "carol", hp: 2, done: false })
        .with(Heal { target: "bob", hp: 3, done: false });
    pipeline.activate(&mut world).unwrap();

    let err = pipeline.process_tick(&mut world).await.unwrap_err();
    assert!(matches!(err, EcsError::ComponentNotPresent { .. }));
    assert_eq!(world.get::<Health>(alice), Some(&Health { hp: 1 }));
    assert_eq!(world.get::<Health>(carol), None);
    assert_eq!(world.get::<Health>(bob), Some(&Health { hp: 3 }));
}

#[tokio::test]
async fn activation_with_unregistered_component_rolls_back() {
    struct Haunted;
    impl Processor<World> for Haunted {
        fn trigger(&self) -> Option<Trigger> {
            Some(Trigger::added(Matcher::new().all_of::<Ghost>()))
        }
    }

    let journal: Journal = Arc::default();
    let mut world = world();
    let mut pipeline = Pipeline::new("haunted")
        .with(Watch { label: "watch", journal })
        .with(Haunted);

    let err = pipeline.activate(&mut world).unwrap_err();
    assert!(matches!(err, EcsError::UnregisteredComponent("Ghost")));
    assert!(!pipeline.is_active());
    assert_eq!(world.subscription_count(), 0);
}

#[tokio::test]
async fn structural_error_fails_the_tick() {
    struct Broken;
    impl Processor<World> for Broken {
        fn execute(&mut self, world: &mut World) -> agora_core::Result<()> {
            world.create("dup")?;
            world.create("dup")?;
            Ok(())
        }
    }

    let mut world = world();
    let mut pipeline = Pipeline::new("broken").with(Broken);
    pipeline.activate(&mut world).unwrap();
    assert!(matches!(
        pipeline.process_tick(&mut world).await,
        Err(EcsError::DuplicateName(_))
    ));
}

#[test]
fn processor_names_follow_registration() {
    let journal: Journal = Arc::default();
    let pipeline: Pipeline<World> = Pipeline::new("names")
        .with(Spread { journal: journal.clone() })
        .with(Watch { label: "watch", journal })
        .with(DestroyProcessor);
    assert_eq!(pipeline.processor_names(), vec!["spread", "watch", "destroy"]);
    assert_eq!(pipeline.len(), 3);
}
