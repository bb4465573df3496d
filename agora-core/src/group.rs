//! Incrementally maintained entity sets with edge-triggered transition logs.
//!
//! ```text
//!   set / replace / remove ──► World::refresh ──► Group::handle
//!                                                   │
//!                      membership changed? ─────────┤
//!                                                   ▼
//!                           log: [(e1, Added), (e2, Added), (e1, Removed), ...]
//!                                  ▲                 ▲
//!                     cursor(sub A)┘    cursor(sub B)┘
//! ```
//!
//! Every membership change appends one entry to the log. Entries are never
//! merged: an entity that enters and leaves in the same tick leaves both an
//! `Added` and a `Removed` entry behind. Each subscription reads the log from
//! its own cursor, and [`Group::drain`] drops only what every subscriber has
//! already consumed.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::entity::Entity;
use crate::matcher::Matcher;
use crate::world::SubscriptionId;

/// Kind of group transition, and the kind a reactive trigger listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupEvent {
    /// Entity started matching.
    Added,
    /// Entity stopped matching (or was destroyed while matching).
    Removed,
    /// Either transition. Only meaningful as a trigger kind.
    AddedOrRemoved,
}

impl GroupEvent {
    /// Whether a trigger of this kind accepts a logged transition.
    #[must_use]
    pub fn accepts(self, logged: GroupEvent) -> bool {
        match self {
            GroupEvent::AddedOrRemoved => true,
            kind => kind == logged,
        }
    }
}

/// The canonical group for one [`Matcher`].
#[derive(Debug)]
pub struct Group {
    matcher: Matcher,
    entities: BTreeSet<Entity>,
    log: Vec<(Entity, GroupEvent)>,
    /// Absolute position of `log[0]`.
    offset: usize,
    cursors: HashMap<SubscriptionId, usize>,
}

impl Group {
    pub(crate) fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            entities: BTreeSet::new(),
            log: Vec::new(),
            offset: 0,
            cursors: HashMap::new(),
        }
    }

    /// The predicate this group maintains.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Whether `entity` is currently a member.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    /// Current members in creation order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().copied()
    }

    /// Number of current members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of subscriptions sharing this group.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.cursors.len()
    }

    /// Number of logged transitions not yet drained.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.log.len()
    }

    /// Logged transitions not yet drained, oldest first.
    pub fn pending_events(&self) -> impl Iterator<Item = (Entity, GroupEvent)> + '_ {
        self.log.iter().copied()
    }

    /// Insert a member without logging a transition. Used to populate a
    /// freshly created group.
    pub(crate) fn seed(&mut self, entity: Entity) {
        self.entities.insert(entity);
    }

    /// Apply the current predicate result for `entity`, logging a transition
    /// if membership changed.
    pub(crate) fn handle(&mut self, entity: Entity, matches: bool) -> Option<GroupEvent> {
        let event = if matches {
            self.entities.insert(entity).then_some(GroupEvent::Added)
        } else {
            self.entities.remove(&entity).then_some(GroupEvent::Removed)
        };
        // Nobody could ever read the entry.
        if let (Some(event), false) = (event, self.cursors.is_empty()) {
            self.log.push((entity, event));
        }
        event
    }

    pub(crate) fn subscribe(&mut self, id: SubscriptionId) {
        self.cursors.insert(id, self.offset + self.log.len());
    }

    /// Remove a subscription, returning how many remain.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> usize {
        self.cursors.remove(&id);
        self.drain();
        self.cursors.len()
    }

    /// Entities with a transition of `kind` since this subscription's cursor,
    /// in first-occurrence order, one entry per entity. Advances the cursor
    /// to the end of the log.
    pub(crate) fn collect(&mut self, id: SubscriptionId, kind: GroupEvent) -> Option<Vec<Entity>> {
        let end = self.offset + self.log.len();
        let cursor = *self.cursors.get(&id)?;
        self.cursors.insert(id, end);
        let start = cursor.saturating_sub(self.offset);
        let mut seen = HashSet::new();
        Some(
            self.log[start..]
                .iter()
                .filter(|(_, logged)| kind.accepts(*logged))
                .filter_map(|(entity, _)| seen.insert(*entity).then_some(*entity))
                .collect(),
        )
    }

    /// Drop every log entry that all subscribers have consumed.
    pub(crate) fn drain(&mut self) {
        let end = self.offset + self.log.len();
        let consumed = self.cursors.values().copied().min().unwrap_or(end);
        let count = consumed.saturating_sub(self.offset).min(self.log.len());
        self.log.drain(..count);
        self.offset += count;
    }
}
