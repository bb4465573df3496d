use std::path::PathBuf;

use agora_core::Processor;
use tracing::error;

use crate::context::GameContext;
use crate::savegame;

/// Writes the game to the configured save directory at the end of every
/// tick. Without a save directory it does nothing. A failed save is logged
/// and the tick goes on.
#[derive(Debug, Default)]
pub struct SaveSystem;

impl Processor<GameContext> for SaveSystem {
    fn name(&self) -> &'static str {
        "save"
    }

    fn cleanup(&mut self, ctx: &mut GameContext) -> agora_core::Result<()> {
        let Some(dir): Option<PathBuf> = ctx.config().persistence.save_dir.clone() else {
            return Ok(());
        };
        if let Err(e) = savegame::save(ctx, &dir) {
            error!(dir = %dir.display(), error = %e, "save failed");
        }
        Ok(())
    }
}
