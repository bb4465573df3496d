//! Plain-data snapshots of entities.
//!
//! A snapshot is an ordered list of `{ name, components: [{ type, data }] }`.
//! Only registered component types are written. Entities are ordered by
//! creation order and components by type name, so the same world always
//! produces the same snapshot.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::component::{ComponentBox, ComponentType};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;

/// One serialized component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// Registered component name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Component value as plain data.
    pub data: Value,
}

/// One serialized entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Display name.
    pub name: String,
    /// Registered components, ordered by type name.
    pub components: Vec<ComponentSnapshot>,
}

impl EntitySnapshot {
    /// The serialized data of component `type_name`, if present.
    #[must_use]
    pub fn component(&self, type_name: &str) -> Option<&Value> {
        self.components
            .iter()
            .find(|c| c.type_name == type_name)
            .map(|c| &c.data)
    }
}

impl World {
    /// Snapshot every live entity.
    ///
    /// # Errors
    /// Returns [`EcsError::Serialization`] if a component fails to serialize.
    pub fn snapshot(&self) -> Result<Vec<EntitySnapshot>> {
        let all: Vec<Entity> = self.entities().collect();
        self.snapshot_entities(&all)
    }

    /// Snapshot the given entities, ordered by creation order. Unknown
    /// handles are skipped.
    ///
    /// # Errors
    /// Returns [`EcsError::Serialization`] if a component fails to serialize.
    pub fn snapshot_entities(&self, entities: &[Entity]) -> Result<Vec<EntitySnapshot>> {
        let mut ordered = entities.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut out = Vec::with_capacity(ordered.len());
        for entity in ordered {
            let Some(record) = self.records.get(&entity) else {
                continue;
            };
            let mut types: Vec<ComponentType> = record.components.keys().copied().collect();
            types.sort();

            let mut components = Vec::with_capacity(types.len());
            for component_type in types {
                let value = &record.components[&component_type];
                if let Some(data) = self.registry().dump(component_type, &**value) {
                    components.push(ComponentSnapshot {
                        type_name: component_type.name().to_string(),
                        data: data?,
                    });
                }
            }
            out.push(EntitySnapshot {
                name: record.name.clone(),
                components,
            });
        }
        Ok(out)
    }

    /// Recreate entities from a snapshot, in list order.
    ///
    /// Everything is validated before the first entity is created: on error
    /// the world is left untouched.
    ///
    /// # Errors
    /// [`EcsError::SnapshotNameCollision`] if a name exists in the world or
    /// appears twice in the list, [`EcsError::DuplicateSnapshotComponent`]
    /// if one entity lists a component type twice,
    /// [`EcsError::UnknownComponentType`] or [`EcsError::Serialization`] if a
    /// component cannot be constructed.
    pub fn restore(&mut self, snapshot: &[EntitySnapshot]) -> Result<Vec<Entity>> {
        let mut seen = HashSet::new();
        let mut staged: Vec<(&str, Vec<(ComponentType, Box<dyn ComponentBox>)>)> =
            Vec::with_capacity(snapshot.len());

        for entity in snapshot {
            if self.entity_by_name(&entity.name).is_some() || !seen.insert(entity.name.as_str()) {
                return Err(EcsError::SnapshotNameCollision(entity.name.clone()));
            }
            let mut types = HashSet::new();
            if let Some(repeated) = entity.components.iter().find(|c| !types.insert(c.type_name.as_str())) {
                return Err(EcsError::DuplicateSnapshotComponent {
                    entity: entity.name.clone(),
                    component: repeated.type_name.clone(),
                });
            }
            let components = entity
                .components
                .iter()
                .map(|c| self.registry().load(&c.type_name, c.data.clone()))
                .collect::<Result<Vec<_>>>()?;
            staged.push((entity.name.as_str(), components));
        }

        let mut created = Vec::with_capacity(staged.len());
        for (name, components) in staged {
            let entity = self.create(name)?;
            for (component_type, value) in components {
                self.insert_boxed(entity, component_type, value)?;
            }
            created.push(entity);
        }
        debug!(count = created.len(), "restored entities from snapshot");
        Ok(created)
    }
}
