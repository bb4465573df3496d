//! Boolean predicates over component-type presence.
//!
//! A [`Matcher`] is a pure value. Two matchers built from the same sets are
//! equal and hash identically, which is what lets the [`World`](crate::World)
//! keep exactly one group per distinct predicate.

use std::collections::BTreeSet;

use crate::component::{Component, ComponentType};
use crate::error::{EcsError, Result};

/// `all_of` / `any_of` / `none_of` predicate over component types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Matcher {
    all_of: BTreeSet<ComponentType>,
    any_of: BTreeSet<ComponentType>,
    none_of: BTreeSet<ComponentType>,
}

impl Matcher {
    /// An empty matcher. It matches every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require component `T`.
    #[must_use]
    pub fn all_of<T: Component>(mut self) -> Self {
        self.all_of.insert(T::component_type());
        self
    }

    /// Require at least one of the `any_of` components, `T` among them.
    #[must_use]
    pub fn any_of<T: Component>(mut self) -> Self {
        self.any_of.insert(T::component_type());
        self
    }

    /// Forbid component `T`.
    #[must_use]
    pub fn none_of<T: Component>(mut self) -> Self {
        self.none_of.insert(T::component_type());
        self
    }

    /// Required component types.
    pub fn required(&self) -> impl Iterator<Item = ComponentType> + '_ {
        self.all_of.iter().copied()
    }

    /// Every component type this matcher mentions, in any of its sets.
    pub fn component_types(&self) -> impl Iterator<Item = ComponentType> + '_ {
        self.all_of
            .iter()
            .chain(&self.any_of)
            .chain(&self.none_of)
            .copied()
    }

    /// Whether a mutation of `component_type` can change this matcher's result.
    #[must_use]
    pub fn references(&self, component_type: ComponentType) -> bool {
        self.all_of.contains(&component_type)
            || self.any_of.contains(&component_type)
            || self.none_of.contains(&component_type)
    }

    /// Evaluate the predicate given a presence test.
    pub fn matches(&self, has: impl Fn(ComponentType) -> bool) -> bool {
        self.all_of.iter().all(|t| has(*t))
            && (self.any_of.is_empty() || self.any_of.iter().any(|t| has(*t)))
            && !self.none_of.iter().any(|t| has(*t))
    }

    /// Check that the three sets are pairwise disjoint.
    ///
    /// # Errors
    /// Returns [`EcsError::InvalidMatcher`] naming the first overlapping type.
    pub fn validate(&self) -> Result<()> {
        let overlap = self
            .all_of
            .intersection(&self.any_of)
            .chain(self.all_of.intersection(&self.none_of))
            .chain(self.any_of.intersection(&self.none_of))
            .next();
        match overlap {
            Some(t) => Err(EcsError::InvalidMatcher(format!(
                "{} appears in more than one set",
                t.name()
            ))),
            None => Ok(()),
        }
    }
}
