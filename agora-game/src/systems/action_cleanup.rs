use agora_core::{Component, Continuation, Entity, Matcher, Processor, World, WorldContext};

use crate::components::{
    AnnounceAction, ArbitrationAction, DrawCardsAction, PlayCardsAction, SpeakAction, WolfKillAction,
};
use crate::context::GameContext;

fn actions() -> Matcher {
    Matcher::new()
        .any_of::<DrawCardsAction>()
        .any_of::<PlayCardsAction>()
        .any_of::<ArbitrationAction>()
        .any_of::<SpeakAction>()
        .any_of::<AnnounceAction>()
        .any_of::<WolfKillAction>()
}

fn strip<T: Component>(world: &mut World, entity: Entity) -> agora_core::Result<()> {
    world.remove::<T>(entity).map(|_| ())
}

/// Removes the action components this tick's reactive phase saw.
///
/// The set is fixed when continuations are resolved, before any effect
/// runs, so an action placed by an effect survives until the next tick's
/// reactive phase has delivered it.
#[derive(Debug, Default)]
pub struct ActionCleanupSystem {
    seen: Vec<Entity>,
}

impl Processor<GameContext> for ActionCleanupSystem {
    fn name(&self) -> &'static str {
        "action-cleanup"
    }

    fn resolve(&mut self, ctx: &GameContext) -> Option<Continuation<GameContext>> {
        self.seen = ctx.world().query(&actions());
        None
    }

    fn cleanup(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        let world = ctx.world_mut();
        for entity in self.seen.drain(..) {
            if !world.contains(entity) {
                continue;
            }
            strip::<DrawCardsAction>(world, entity)?;
            strip::<PlayCardsAction>(world, entity)?;
            strip::<ArbitrationAction>(world, entity)?;
            strip::<SpeakAction>(world, entity)?;
            strip::<AnnounceAction>(world, entity)?;
            strip::<WolfKillAction>(world, entity)?;
        }
        Ok(())
    }
}
