//! Processors: the units of behavior a [`Pipeline`](crate::Pipeline) runs.
//!
//! A processor opts into any subset of roles by overriding the matching
//! default method:
//!
//! | Role        | Method                       | When                                  |
//! |-------------|------------------------------|---------------------------------------|
//! | Initialize  | [`Processor::initialize`]    | once, when the pipeline initializes   |
//! | Execute     | [`Processor::execute`]       | every tick, in registration order     |
//! | Reactive    | [`Processor::trigger`] + [`Processor::filter`] + [`Processor::react`] | every tick with pending transitions |
//! | Continuation| [`Processor::resolve`]       | every tick, after all sync phases     |
//! | Cleanup     | [`Processor::cleanup`]       | end of every tick                     |
//! | Teardown    | [`Processor::teardown`]      | once, when the pipeline shuts down    |
//!
//! ## Continuations
//!
//! `react` and `execute` are synchronous and may only snapshot what they need
//! (entity names, prompts) into the processor. `resolve` turns that snapshot
//! into a `'static` future that owns all of its inputs; the future yields an
//! [`Effect`] which the pipeline applies back on the control thread. Nothing
//! borrowed from the world ever crosses the await, so an effect must re-fetch
//! every entity by name before mutating it.

use futures::future::BoxFuture;

use crate::component::Destroy;
use crate::entity::Entity;
use crate::error::Result;
use crate::group::GroupEvent;
use crate::matcher::Matcher;
use crate::world::World;

/// Context handed to every processor call. Owns the [`World`].
pub trait WorldContext: Send {
    /// The entity store.
    fn world(&self) -> &World;
    /// The entity store, mutably.
    fn world_mut(&mut self) -> &mut World;
}

impl WorldContext for World {
    fn world(&self) -> &World {
        self
    }

    fn world_mut(&mut self) -> &mut World {
        self
    }
}

/// A mutation produced by a continuation, applied on the control thread.
pub type Effect<C> = Box<dyn FnOnce(&mut C) -> Result<()> + Send>;

/// The asynchronous second phase of a processor.
pub type Continuation<C> = BoxFuture<'static, Effect<C>>;

/// A reactive processor's subscription: which group, and which transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Predicate of the group to subscribe to.
    pub matcher: Matcher,
    /// Transition kind that fires the processor.
    pub event: GroupEvent,
}

impl Trigger {
    /// Fire on entities entering the group.
    #[must_use]
    pub fn added(matcher: Matcher) -> Self {
        Self {
            matcher,
            event: GroupEvent::Added,
        }
    }

    /// Fire on entities leaving the group.
    #[must_use]
    pub fn removed(matcher: Matcher) -> Self {
        Self {
            matcher,
            event: GroupEvent::Removed,
        }
    }
}

/// A unit of behavior. Every method defaults to a no-op.
pub trait Processor<C: WorldContext>: Send {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Runs once when the pipeline initializes.
    ///
    /// # Errors
    /// A structural error fails initialization.
    fn initialize(&mut self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    /// Runs every tick.
    ///
    /// # Errors
    /// A structural error fails the tick.
    fn execute(&mut self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    /// The group and transition kind this processor reacts to.
    fn trigger(&self) -> Option<Trigger> {
        None
    }

    /// Fine-grained gate applied to each triggered entity before `react`.
    fn filter(&self, _ctx: &C, _entity: Entity) -> bool {
        true
    }

    /// Receives the filtered batch of triggered entities. Never called with
    /// an empty batch.
    ///
    /// # Errors
    /// A structural error fails the tick.
    fn react(&mut self, _ctx: &mut C, _entities: Vec<Entity>) -> Result<()> {
        Ok(())
    }

    /// Hand the pipeline this tick's continuation, if any work was queued.
    fn resolve(&mut self, _ctx: &C) -> Option<Continuation<C>> {
        None
    }

    /// Runs at the end of every tick.
    ///
    /// # Errors
    /// A structural error fails the tick.
    fn cleanup(&mut self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    /// Runs once when the pipeline shuts down.
    ///
    /// # Errors
    /// A structural error is reported by `shutdown`.
    fn teardown(&mut self, _ctx: &mut C) -> Result<()> {
        Ok(())
    }
}

/// Destroys every entity carrying a [`Destroy`] marker. Cleanup role only.
///
/// Runs late in the tick so that every other processor sees a consistent
/// world for the whole tick. Destroying twice is harmless.
#[derive(Debug, Default)]
pub struct DestroyProcessor;

impl<C: WorldContext> Processor<C> for DestroyProcessor {
    fn name(&self) -> &'static str {
        "destroy"
    }

    fn cleanup(&mut self, ctx: &mut C) -> Result<()> {
        let world = ctx.world_mut();
        let doomed = world.query(&Matcher::new().all_of::<Destroy>());
        for entity in doomed {
            world.destroy(entity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_processor_is_idempotent() {
        let mut world = World::new();
        let a = world.create("A").unwrap();
        let b = world.create("B").unwrap();
        world.set(a, Destroy).unwrap();

        let mut destroy = DestroyProcessor;
        Processor::<World>::cleanup(&mut destroy, &mut world).unwrap();
        Processor::<World>::cleanup(&mut destroy, &mut world).unwrap();

        assert!(!world.contains(a));
        assert!(world.contains(b));
        assert!(!world.destroy(a));
    }

    #[test]
    fn trigger_constructors() {
        let matcher = Matcher::new().all_of::<Destroy>();
        assert_eq!(Trigger::added(matcher.clone()).event, GroupEvent::Added);
        assert_eq!(Trigger::removed(matcher).event, GroupEvent::Removed);
    }
}
