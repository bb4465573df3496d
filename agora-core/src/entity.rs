//! Entity handles and per-entity records.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::{ComponentBox, ComponentType};

/// Opaque handle to an entity in a [`World`](crate::World).
///
/// Handles are allocated from a monotonic counter and never reused, so a
/// handle's ordering is the entity's creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub(crate) u64);

impl Entity {
    /// The raw handle value.
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Storage for one live entity: its display name and component map.
#[derive(Debug)]
pub(crate) struct EntityRecord {
    pub(crate) name: String,
    pub(crate) components: HashMap<ComponentType, Box<dyn ComponentBox>>,
}

impl EntityRecord {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            components: HashMap::new(),
        }
    }

    pub(crate) fn has(&self, component_type: ComponentType) -> bool {
        self.components.contains_key(&component_type)
    }
}
