//! # agora-core
//!
//! Entity-Component-System runtime substrate for turn-based, agent-populated
//! simulations.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │ Pipeline  (one simulation phase)                         │
//!  │   execute → reactive(filter, react) → drain → resolve ⇉  │
//!  │   (joined continuations) → effects → cleanup             │
//!  └───────────────┬──────────────────────────────────────────┘
//!                  │ &mut C: WorldContext
//!  ┌───────────────▼──────────────────────────────────────────┐
//!  │ World                                                    │
//!  │   entities + name index + component maps                 │
//!  │   canonical Group per Matcher (ref-counted)              │
//!  │   ComponentRegistry (snapshot (de)serializers)           │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`World`] owns every entity and keeps every subscribed [`Group`]
//!   consistent with component state on each mutation.
//! - [`Matcher`] is a pure `all_of` / `any_of` / `none_of` predicate.
//! - [`Processor`] is a unit of behavior; [`Pipeline`] orders them and
//!   drives the tick.
//! - [`snapshot`] and [`persistence`] turn registered components into plain
//!   JSON and back.
//!
//! Time only moves in discrete ticks. There is no wall clock anywhere in
//! this crate.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod component;
pub mod entity;
pub mod error;
pub mod group;
pub mod matcher;
pub mod persistence;
pub mod pipeline;
pub mod processor;
pub mod snapshot;
pub mod world;

pub use component::{Component, ComponentRegistry, ComponentType, Destroy};
pub use entity::Entity;
pub use error::{EcsError, Result};
pub use group::{Group, GroupEvent};
pub use matcher::Matcher;
pub use pipeline::Pipeline;
pub use processor::{Continuation, DestroyProcessor, Effect, Processor, Trigger, WorldContext};
pub use snapshot::{ComponentSnapshot, EntitySnapshot};
pub use world::{SubscriptionId, World};
