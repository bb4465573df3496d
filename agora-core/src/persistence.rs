//! JSON snapshot files.
//!
//! One file holds one ordered snapshot list. Writes go to a sibling
//! temporary file first and are renamed into place, so a crash mid-save
//! never leaves a truncated snapshot behind.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::snapshot::EntitySnapshot;
use crate::world::World;

/// Write a snapshot list to `path` as pretty JSON.
///
/// # Errors
/// Returns an error if serialization or any filesystem step fails.
pub fn save_snapshot(path: &Path, snapshot: &[EntitySnapshot]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json)?;
    fs::rename(&staging, path)?;
    info!(path = %path.display(), entities = snapshot.len(), "snapshot saved");
    Ok(())
}

/// Read a snapshot list from `path`.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a snapshot list.
pub fn load_snapshot(path: &Path) -> Result<Vec<EntitySnapshot>> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Snapshot every entity of `world` into `path`.
///
/// # Errors
/// See [`save_snapshot`].
pub fn save_world(world: &World, path: &Path) -> Result<()> {
    save_snapshot(path, &world.snapshot()?)
}
