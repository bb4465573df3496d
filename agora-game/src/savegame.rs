//! Save directories.
//!
//! ```text
//! <dir>/
//!   entities.json    registered components of every entity (agora-core snapshot)
//!   histories.json   agent histories by name
//!   session.json     combat sequence and social deduction state
//! ```
//!
//! Each file is written to a staging sibling and renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use agora_core::WorldContext;
use agora_core::persistence::{load_snapshot, save_world};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::combat::CombatSequence;
use crate::context::{GameContext, SocialState};
use crate::error::Result;
use crate::history::AgentHistory;

/// Entity snapshot file name.
pub const ENTITIES_FILE: &str = "entities.json";
/// History file name.
pub const HISTORIES_FILE: &str = "histories.json";
/// Session state file name.
pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    combat: CombatSequence,
    social: SocialState,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json)?;
    fs::rename(&staging, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Write the world, histories and session state into `dir`.
///
/// # Errors
/// Any serialization or filesystem failure.
pub fn save(ctx: &GameContext, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    save_world(ctx.world(), &dir.join(ENTITIES_FILE))?;
    write_json(&dir.join(HISTORIES_FILE), ctx.histories())?;
    write_json(
        &dir.join(SESSION_FILE),
        &Session {
            combat: ctx.combat().clone(),
            social: ctx.social().clone(),
        },
    )?;
    info!(dir = %dir.display(), "game saved");
    Ok(())
}

/// Restore a save from `dir` into `ctx`, which should be fresh. Returns the
/// number of restored entities.
///
/// Everything is read and parsed before the context is touched.
///
/// # Errors
/// Any filesystem or parse failure, or a name collision with an entity
/// already in the world.
pub fn load(ctx: &mut GameContext, dir: &Path) -> Result<usize> {
    let snapshot = load_snapshot(&dir.join(ENTITIES_FILE))?;
    let histories: BTreeMap<String, AgentHistory> = read_json(&dir.join(HISTORIES_FILE))?;
    let session: Session = read_json(&dir.join(SESSION_FILE))?;

    let restored = ctx.world_mut().restore(&snapshot)?.len();
    ctx.set_histories(histories);
    *ctx.combat_mut() = session.combat;
    *ctx.social_mut() = session.social;
    info!(dir = %dir.display(), entities = restored, "game loaded");
    Ok(restored)
}
