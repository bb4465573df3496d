//! The entity store: entity identity, name index, component maps, and the
//! canonical groups kept consistent with them.
//!
//! ## Consistency contract
//!
//! Every `set` / `replace` / `remove` re-evaluates, before returning, each
//! group whose matcher mentions the mutated component type. Membership is
//! therefore never stale: between any two calls, an entity is in
//! `Group(M)` iff it satisfies `M`.
//!
//! `get_mut` hands out in-place access. It cannot add or remove a
//! component, so it cannot change group membership and triggers nothing.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::component::{Component, ComponentBox, ComponentRegistry, ComponentType, Destroy};
use crate::entity::{Entity, EntityRecord};
use crate::error::{EcsError, Result};
use crate::group::{Group, GroupEvent};
use crate::matcher::Matcher;

/// Handle to one subscription on a canonical group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

/// Owner of every entity, component and group.
pub struct World {
    registry: ComponentRegistry,
    pub(crate) records: BTreeMap<Entity, EntityRecord>,
    names: HashMap<String, Entity>,
    next_entity: u64,

    groups: Vec<Option<Group>>,
    group_index: HashMap<Matcher, usize>,
    by_type: HashMap<ComponentType, Vec<usize>>,
    subscriptions: HashMap<SubscriptionId, usize>,
    next_subscription: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty world. The [`Destroy`] marker is pre-registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = ComponentRegistry::new();
        // A fresh registry cannot hold a conflicting name.
        let _ = registry.register::<Destroy>();
        Self {
            registry,
            records: BTreeMap::new(),
            names: HashMap::new(),
            next_entity: 1,
            groups: Vec::new(),
            group_index: HashMap::new(),
            by_type: HashMap::new(),
            subscriptions: HashMap::new(),
            next_subscription: 1,
        }
    }

    /// The component registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Register component type `T`.
    ///
    /// # Errors
    /// See [`ComponentRegistry::register`].
    pub fn register<T: Component + Serialize + DeserializeOwned>(&mut self) -> Result<()> {
        self.registry.register::<T>()
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Create a new entity with a unique display name.
    ///
    /// The new entity is evaluated against every group, so matchers made
    /// only of `none_of` clauses pick it up immediately.
    ///
    /// # Errors
    /// Returns [`EcsError::DuplicateName`] if `name` is already indexed.
    pub fn create(&mut self, name: impl Into<String>) -> Result<Entity> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(EcsError::DuplicateName(name));
        }
        let entity = Entity(self.next_entity);
        self.next_entity += 1;
        self.names.insert(name.clone(), entity);
        self.records.insert(entity, EntityRecord::new(name));

        let record = &self.records[&entity];
        for group in self.groups.iter_mut().flatten() {
            let matches = group.matcher().matches(|t| record.has(t));
            group.handle(entity, matches);
        }
        trace!(%entity, "created entity");
        Ok(entity)
    }

    /// Remove an entity, its name-index entry and all its components.
    ///
    /// Emits `Removed` on every group that contained it. Destroying an
    /// entity that no longer exists is a no-op and returns `false`.
    ///
    /// Only the destroy step of the cleanup phase calls this; everything else
    /// requests destruction with a [`Destroy`] marker.
    pub(crate) fn destroy(&mut self, entity: Entity) -> bool {
        let Some(record) = self.records.remove(&entity) else {
            return false;
        };
        self.names.remove(&record.name);
        for group in self.groups.iter_mut().flatten() {
            group.handle(entity, false);
        }
        debug!(%entity, name = %record.name, "destroyed entity");
        true
    }

    /// Whether `entity` is live.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.records.contains_key(&entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the world has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All live entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.records.keys().copied()
    }

    /// Look up an entity by display name.
    #[must_use]
    pub fn entity_by_name(&self, name: &str) -> Option<Entity> {
        self.names.get(name).copied()
    }

    /// Display name of a live entity.
    #[must_use]
    pub fn name(&self, entity: Entity) -> Option<&str> {
        self.records.get(&entity).map(|r| r.name.as_str())
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    /// Borrow component `T` of `entity`, if present.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.records
            .get(&entity)?
            .components
            .get(&T::component_type())?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Borrow component `T` of `entity`, distinguishing why it is missing.
    ///
    /// # Errors
    /// [`EcsError::EntityNotFound`] or [`EcsError::ComponentNotPresent`].
    pub fn try_get<T: Component>(&self, entity: Entity) -> Result<&T> {
        let record = self
            .records
            .get(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        record
            .components
            .get(&T::component_type())
            .and_then(|c| c.as_any().downcast_ref::<T>())
            .ok_or(EcsError::ComponentNotPresent {
                entity,
                component: T::NAME,
            })
    }

    /// Mutably borrow component `T` of `entity`. Group membership is
    /// unaffected.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.records
            .get_mut(&entity)?
            .components
            .get_mut(&T::component_type())?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// O(1) presence test.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.has_type(entity, T::component_type())
    }

    /// O(1) presence test by runtime type identity.
    #[must_use]
    pub fn has_type(&self, entity: Entity, component_type: ComponentType) -> bool {
        self.records
            .get(&entity)
            .is_some_and(|r| r.has(component_type))
    }

    /// Attach or overwrite component `T`.
    ///
    /// # Errors
    /// Returns [`EcsError::EntityNotFound`] if `entity` is not live.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        self.replace(entity, value).map(|_| ())
    }

    /// Attach or overwrite component `T`, returning the previous value.
    ///
    /// # Errors
    /// Returns [`EcsError::EntityNotFound`] if `entity` is not live.
    pub fn replace<T: Component>(&mut self, entity: Entity, value: T) -> Result<Option<T>> {
        let previous = self.insert_boxed(entity, T::component_type(), Box::new(value))?;
        Ok(previous
            .and_then(|p| p.into_any().downcast::<T>().ok())
            .map(|p| *p))
    }

    /// Detach component `T`, returning it if it was present.
    ///
    /// # Errors
    /// Returns [`EcsError::EntityNotFound`] if `entity` is not live.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<Option<T>> {
        let component_type = T::component_type();
        let record = self
            .records
            .get_mut(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let Some(previous) = record.components.remove(&component_type) else {
            return Ok(None);
        };
        self.refresh(entity, component_type);
        Ok(previous.into_any().downcast::<T>().ok().map(|p| *p))
    }

    pub(crate) fn insert_boxed(
        &mut self,
        entity: Entity,
        component_type: ComponentType,
        value: Box<dyn ComponentBox>,
    ) -> Result<Option<Box<dyn ComponentBox>>> {
        let record = self
            .records
            .get_mut(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let previous = record.components.insert(component_type, value);
        if previous.is_none() {
            self.refresh(entity, component_type);
        }
        Ok(previous)
    }

    /// Re-evaluate the groups that mention `component_type` for one entity.
    fn refresh(&mut self, entity: Entity, component_type: ComponentType) {
        let (Some(ids), Some(record)) = (self.by_type.get(&component_type), self.records.get(&entity))
        else {
            return;
        };
        for &id in ids {
            if let Some(group) = self.groups[id].as_mut() {
                let matches = group.matcher().matches(|t| record.has(t));
                if let Some(event) = group.handle(entity, matches) {
                    trace!(%entity, ?event, component = component_type.name(), "group transition");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Entities matching `matcher`, in creation order.
    ///
    /// Served from the canonical group when one is subscribed, otherwise by
    /// scanning every entity.
    #[must_use]
    pub fn query(&self, matcher: &Matcher) -> Vec<Entity> {
        if let Some(group) = self.group(matcher) {
            return group.entities().collect();
        }
        self.records
            .iter()
            .filter(|(_, record)| matcher.matches(|t| record.has(t)))
            .map(|(entity, _)| *entity)
            .collect()
    }

    /// The canonical group for `matcher`, if any subscription holds it.
    #[must_use]
    pub fn group(&self, matcher: &Matcher) -> Option<&Group> {
        self.group_index
            .get(matcher)
            .and_then(|&id| self.groups[id].as_ref())
    }

    /// Number of live canonical groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.group_index.len()
    }

    /// Subscribe to the canonical group for `matcher`, creating and
    /// populating it on first use.
    ///
    /// The new subscription only observes transitions that happen after this
    /// call.
    ///
    /// # Errors
    /// [`EcsError::InvalidMatcher`] if the matcher's sets overlap,
    /// [`EcsError::UnregisteredComponent`] if it names an unregistered type.
    pub fn subscribe(&mut self, matcher: Matcher) -> Result<SubscriptionId> {
        matcher.validate()?;
        if let Some(missing) = matcher
            .component_types()
            .find(|t| !self.registry.contains(*t))
        {
            return Err(EcsError::UnregisteredComponent(missing.name()));
        }

        let group_id = match self.group_index.get(&matcher) {
            Some(&id) => id,
            None => self.create_group(matcher),
        };
        let subscription = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        if let Some(group) = self.groups[group_id].as_mut() {
            group.subscribe(subscription);
        }
        self.subscriptions.insert(subscription, group_id);
        Ok(subscription)
    }

    fn create_group(&mut self, matcher: Matcher) -> usize {
        let mut group = Group::new(matcher.clone());
        for (entity, record) in &self.records {
            if matcher.matches(|t| record.has(t)) {
                group.seed(*entity);
            }
        }
        let id = match self.groups.iter().position(Option::is_none) {
            Some(free) => {
                self.groups[free] = Some(group);
                free
            }
            None => {
                self.groups.push(Some(group));
                self.groups.len() - 1
            }
        };
        for component_type in matcher.component_types() {
            self.by_type.entry(component_type).or_default().push(id);
        }
        debug!(?matcher, id, "created group");
        self.group_index.insert(matcher, id);
        id
    }

    /// Release a subscription. The group is dropped with its last subscriber.
    ///
    /// Returns `false` if the subscription was not active.
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        let Some(group_id) = self.subscriptions.remove(&subscription) else {
            return false;
        };
        let remaining = self.groups[group_id]
            .as_mut()
            .map_or(0, |g| g.unsubscribe(subscription));
        if remaining > 0 {
            return true;
        }
        if let Some(group) = self.groups[group_id].take() {
            self.group_index.remove(group.matcher());
            for component_type in group.matcher().component_types() {
                if let Some(ids) = self.by_type.get_mut(&component_type) {
                    ids.retain(|&id| id != group_id);
                    if ids.is_empty() {
                        self.by_type.remove(&component_type);
                    }
                }
            }
            debug!(matcher = ?group.matcher(), "dropped group");
        }
        true
    }

    /// Number of active subscriptions across all groups.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Transitions of `kind` not yet seen by `subscription`, one entry per
    /// entity in first-occurrence order.
    ///
    /// # Errors
    /// Returns [`EcsError::UnknownSubscription`] for an inactive subscription.
    pub fn collect(&mut self, subscription: SubscriptionId, kind: GroupEvent) -> Result<Vec<Entity>> {
        self.subscriptions
            .get(&subscription)
            .and_then(|&id| self.groups[id].as_mut())
            .and_then(|g| g.collect(subscription, kind))
            .ok_or(EcsError::UnknownSubscription(subscription))
    }

    /// Drop every logged transition that all subscribers have consumed.
    pub fn drain_events(&mut self) {
        for group in self.groups.iter_mut().flatten() {
            group.drain();
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.records.len())
            .field("groups", &self.group_index.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Health {
        hp: u32,
        max_hp: u32,
    }
    crate::component!(Health);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Poisoned;
    crate::component!(Poisoned);

    #[derive(Debug, Clone, PartialEq)]
    struct Unregistered;
    crate::component!(Unregistered);

    fn world() -> World {
        let mut world = World::new();
        world.register::<Health>().unwrap();
        world.register::<Poisoned>().unwrap();
        world
    }

    #[test]
    fn create_rejects_duplicate_names() {
        let mut world = world();
        let a = world.create("A").unwrap();
        assert!(matches!(world.create("A"), Err(EcsError::DuplicateName(n)) if n == "A"));
        assert_eq!(world.entity_by_name("A"), Some(a));
        assert_eq!(world.name(a), Some("A"));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn set_get_replace_remove() {
        let mut world = world();
        let a = world.create("A").unwrap();
        assert!(!world.has::<Health>(a));
        assert!(matches!(
            world.try_get::<Health>(a),
            Err(EcsError::ComponentNotPresent { component: "Health", .. })
        ));

        world.set(a, Health { hp: 10, max_hp: 10 }).unwrap();
        assert!(world.has::<Health>(a));
        assert_eq!(world.get::<Health>(a).map(|h| h.hp), Some(10));

        let previous = world.replace(a, Health { hp: 4, max_hp: 10 }).unwrap();
        assert_eq!(previous, Some(Health { hp: 10, max_hp: 10 }));

        if let Some(health) = world.get_mut::<Health>(a) {
            health.hp -= 1;
        }
        assert_eq!(world.try_get::<Health>(a).unwrap().hp, 3);

        assert_eq!(world.remove::<Health>(a).unwrap(), Some(Health { hp: 3, max_hp: 10 }));
        assert_eq!(world.remove::<Health>(a).unwrap(), None);
    }

    #[test]
    fn mutations_on_missing_entity_fail() {
        let mut world = world();
        let a = world.create("A").unwrap();
        assert!(world.destroy(a));
        assert!(matches!(world.set(a, Poisoned), Err(EcsError::EntityNotFound(_))));
        assert!(matches!(world.try_get::<Poisoned>(a), Err(EcsError::EntityNotFound(_))));
        assert!(world.get::<Poisoned>(a).is_none());
    }

    #[test]
    fn removing_health_moves_entity_to_removed_queue() {
        let mut world = world();
        let a = world.create("A").unwrap();
        world.set(a, Health { hp: 10, max_hp: 10 }).unwrap();

        let matcher = Matcher::new().all_of::<Health>();
        let sub = world.subscribe(matcher.clone()).unwrap();
        assert!(world.group(&matcher).unwrap().contains(a));

        world.remove::<Health>(a).unwrap();
        assert_eq!(world.collect(sub, GroupEvent::Removed).unwrap(), vec![a]);
        assert!(!world.group(&matcher).unwrap().contains(a));
    }

    #[test]
    fn identical_matchers_share_one_group() {
        let mut world = world();
        let first = world.subscribe(Matcher::new().all_of::<Health>()).unwrap();
        let second = world.subscribe(Matcher::new().all_of::<Health>()).unwrap();
        assert_ne!(first, second);
        assert_eq!(world.group_count(), 1);
        assert_eq!(world.subscription_count(), 2);

        assert!(world.unsubscribe(first));
        assert_eq!(world.group_count(), 1);
        assert!(world.unsubscribe(second));
        assert_eq!(world.group_count(), 0);
        assert!(!world.unsubscribe(second));
    }

    #[test]
    fn subscribe_validates_matcher() {
        let mut world = world();
        assert!(matches!(
            world.subscribe(Matcher::new().all_of::<Unregistered>()),
            Err(EcsError::UnregisteredComponent("Unregistered"))
        ));
        assert!(matches!(
            world.subscribe(Matcher::new().all_of::<Health>().none_of::<Health>()),
            Err(EcsError::InvalidMatcher(_))
        ));
        assert_eq!(world.group_count(), 0);
    }

    #[test]
    fn none_of_group_picks_up_new_entities() {
        let mut world = world();
        let sub = world.subscribe(Matcher::new().none_of::<Poisoned>()).unwrap();
        let a = world.create("A").unwrap();
        assert_eq!(world.collect(sub, GroupEvent::Added).unwrap(), vec![a]);

        world.set(a, Poisoned).unwrap();
        assert_eq!(world.collect(sub, GroupEvent::Removed).unwrap(), vec![a]);
    }

    #[test]
    fn destroy_is_idempotent_and_emits_removed() {
        let mut world = world();
        let a = world.create("A").unwrap();
        world.set(a, Health { hp: 1, max_hp: 1 }).unwrap();
        let sub = world.subscribe(Matcher::new().all_of::<Health>()).unwrap();

        assert!(world.destroy(a));
        assert!(!world.destroy(a));
        assert_eq!(world.collect(sub, GroupEvent::Removed).unwrap(), vec![a]);
        assert_eq!(world.entity_by_name("A"), None);

        // The name is free again, the handle is not reused.
        let b = world.create("A").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn get_mut_does_not_touch_groups() {
        let mut world = world();
        let a = world.create("A").unwrap();
        world.set(a, Health { hp: 5, max_hp: 5 }).unwrap();
        let sub = world.subscribe(Matcher::new().all_of::<Health>()).unwrap();
        if let Some(health) = world.get_mut::<Health>(a) {
            health.hp = 0;
        }
        world.set(a, Health { hp: 1, max_hp: 5 }).unwrap();
        assert!(world.collect(sub, GroupEvent::AddedOrRemoved).unwrap().is_empty());
    }

    #[test]
    fn query_with_and_without_group() {
        let mut world = world();
        let a = world.create("A").unwrap();
        let b = world.create("B").unwrap();
        world.set(b, Poisoned).unwrap();
        world.set(a, Poisoned).unwrap();

        let matcher = Matcher::new().all_of::<Poisoned>();
        assert_eq!(world.query(&matcher), vec![a, b]);
        let _sub = world.subscribe(matcher.clone()).unwrap();
        assert_eq!(world.query(&matcher), vec![a, b]);
    }
}
