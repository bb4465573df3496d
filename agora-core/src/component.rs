//! Component identity, type-erased storage and the component registry.
//!
//! Components are plain values: no behavior, comparable, cloneable. Each
//! component type has a stable [`ComponentType`] made of its `NAME` and its
//! Rust [`TypeId`]. The name is what snapshots carry on disk; the `TypeId`
//! is what the entity store keys its per-entity maps by.
//!
//! Use the [`component!`](crate::component!) macro to implement
//! [`Component`] on a type:
//!
//! ```
//! use agora_core::component;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! pub struct Health {
//!     pub hp: u32,
//!     pub max_hp: u32,
//! }
//! component!(Health);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{EcsError, Result};

/// The trait every component type implements.
///
/// `NAME` must be unique across all registered component types; it is the
/// identity used by snapshots.
pub trait Component: Any + Clone + PartialEq + Debug + Send + Sync {
    /// Stable, serialized name of this component type.
    const NAME: &'static str;

    /// The runtime identity of this component type.
    #[must_use]
    fn component_type() -> ComponentType
    where
        Self: Sized,
    {
        ComponentType::of::<Self>()
    }
}

/// Implement the [`Component`] trait on a type.
///
/// `component!(Type)` names the component after the type;
/// `component!(Type, "Name")` overrides the serialized name.
#[macro_export]
macro_rules! component {
    ($ty:ident) => {
        $crate::component!($ty, stringify!($ty));
    };
    ($ty:ident, $name:expr) => {
        impl $crate::component::Component for $ty {
            const NAME: &'static str = $name;
        }
    };
}

/// A component type identity: serialized name plus Rust type id.
///
/// Ordering is by name first so that sets of component types iterate
/// deterministically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentType {
    name: &'static str,
    id: TypeId,
}

impl ComponentType {
    /// The identity of component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            name: T::NAME,
            id: TypeId::of::<T>(),
        }
    }

    /// Serialized name of this component type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Debug for ComponentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ---------------------------------------------------------------------------
// Type-erased storage
// ---------------------------------------------------------------------------

/// Object-safe view of a stored component value.
pub(crate) trait ComponentBox: Any + Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Component> ComponentBox for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type DumpFn = fn(&dyn Any) -> Result<Value>;
type LoadFn = fn(Value) -> Result<Box<dyn ComponentBox>>;

#[derive(Clone, Copy)]
struct Registration {
    component_type: ComponentType,
    dump: DumpFn,
    load: LoadFn,
}

fn dump<T: Component + Serialize>(value: &dyn Any) -> Result<Value> {
    let value = value
        .downcast_ref::<T>()
        .ok_or_else(|| EcsError::Serialization(format!("stored value is not a {}", T::NAME)))?;
    Ok(serde_json::to_value(value)?)
}

fn load<T: Component + DeserializeOwned>(data: Value) -> Result<Box<dyn ComponentBox>> {
    let value: T = serde_json::from_value(data)
        .map_err(|e| EcsError::Serialization(format!("{}: {e}", T::NAME)))?;
    Ok(Box::new(value))
}

/// Maps component type identity to its (de)serializer pair.
///
/// A component type must be registered before it appears in any subscribed
/// matcher, and only registered types are written into snapshots.
#[derive(Default)]
pub struct ComponentRegistry {
    by_id: HashMap<TypeId, Registration>,
    by_name: HashMap<&'static str, TypeId>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register component type `T`.
    ///
    /// Registering the same type twice is a no-op.
    ///
    /// # Errors
    /// Returns [`EcsError::DuplicateRegistration`] if a different type is
    /// already registered under `T::NAME`.
    pub fn register<T: Component + Serialize + DeserializeOwned>(&mut self) -> Result<()> {
        let id = TypeId::of::<T>();
        match self.by_name.get(T::NAME) {
            Some(existing) if *existing == id => return Ok(()),
            Some(_) => return Err(EcsError::DuplicateRegistration(T::NAME.to_string())),
            None => {}
        }
        self.by_name.insert(T::NAME, id);
        self.by_id.insert(
            id,
            Registration {
                component_type: ComponentType::of::<T>(),
                dump: dump::<T>,
                load: load::<T>,
            },
        );
        Ok(())
    }

    /// Whether this component type has been registered.
    #[must_use]
    pub fn contains(&self, component_type: ComponentType) -> bool {
        self.by_id.contains_key(&component_type.id)
    }

    /// Look up a registered component type by its serialized name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ComponentType> {
        self.by_name
            .get(name)
            .and_then(|id| self.by_id.get(id))
            .map(|r| r.component_type)
    }

    /// Number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterate over all registered component types, ordered by name.
    pub fn component_types(&self) -> impl Iterator<Item = ComponentType> + '_ {
        let mut types: Vec<_> = self.by_id.values().map(|r| r.component_type).collect();
        types.sort();
        types.into_iter()
    }

    /// Dump a stored value to plain data. `None` if its type is unregistered.
    pub(crate) fn dump(&self, component_type: ComponentType, value: &dyn ComponentBox) -> Option<Result<Value>> {
        self.by_id
            .get(&component_type.id)
            .map(|r| (r.dump)(value.as_any()))
    }

    /// Construct a stored value from plain data.
    pub(crate) fn load(&self, name: &str, data: Value) -> Result<(ComponentType, Box<dyn ComponentBox>)> {
        let registration = self
            .by_name
            .get(name)
            .and_then(|id| self.by_id.get(id))
            .ok_or_else(|| EcsError::UnknownComponentType(name.to_string()))?;
        let value = (registration.load)(data)?;
        Ok((registration.component_type, value))
    }
}

impl Debug for ComponentRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.component_types()).finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in components
// ---------------------------------------------------------------------------

/// Marker requesting deferred destruction of its entity.
///
/// The entity stays fully observable for the rest of the tick; the
/// [`DestroyProcessor`](crate::processor::DestroyProcessor) removes it during
/// cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Destroy;
crate::component!(Destroy);

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Health {
        hp: u32,
    }
    crate::component!(Health);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Impostor;
    crate::component!(Impostor, "Health");

    #[test]
    fn component_types_are_distinct() {
        assert_ne!(ComponentType::of::<Health>(), ComponentType::of::<Destroy>());
        assert_eq!(Health::component_type().name(), "Health");
        assert_eq!(format!("{:?}", Destroy::component_type()), "Destroy");
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>().unwrap();
        registry.register::<Health>().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(Health::component_type()));
        assert_eq!(registry.lookup("Health"), Some(Health::component_type()));
    }

    #[test]
    fn name_clash_is_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>().unwrap();
        let err = registry.register::<Impostor>().unwrap_err();
        assert!(matches!(err, EcsError::DuplicateRegistration(name) if name == "Health"));
    }

    #[test]
    fn dump_and_load_through_registry() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>().unwrap();

        let stored: Box<dyn ComponentBox> = Box::new(Health { hp: 7 });
        let data = registry
            .dump(Health::component_type(), stored.as_ref())
            .unwrap()
            .unwrap();
        assert_eq!(data, serde_json::json!({ "hp": 7 }));

        let (ty, loaded) = registry.load("Health", data).unwrap();
        assert_eq!(ty, Health::component_type());
        assert_eq!(loaded.as_any().downcast_ref::<Health>(), Some(&Health { hp: 7 }));

        assert!(matches!(
            registry.load("Mana", serde_json::json!({})),
            Err(EcsError::UnknownComponentType(_))
        ));
        assert!(matches!(
            registry.load("Health", serde_json::json!({ "hp": "lots" })),
            Err(EcsError::Serialization(_))
        ));
    }
}
