//! # agora-game
//!
//! The game layer on top of the `agora-core` runtime: components, the combat
//! sequence, every processor and the three pipelines built from them, plus
//! the [`Game`] host driver.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Game (host driver)                                           │
//! │   enter_home / enter_dungeon / enter_social_deduction        │
//! │   queue_draw_cards / queue_play_cards / tick / save / load   │
//! │                                                              │
//! │   ┌───────────────┐   one active   ┌──────────────────────┐  │
//! │   │ GameContext   │◀──────────────▶│ Pipeline<GameContext>│  │
//! │   │  World        │                │  systems::*          │  │
//! │   │  histories    │                └──────────┬───────────┘  │
//! │   │  CombatSequence                           │ continuations│
//! │   │  SocialState  │                ┌──────────▼───────────┐  │
//! │   │  rng, config  │                │ dyn DecisionService  │  │
//! │   └───────────────┘                └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `components`: every game component and their registration
//! - `combat`: the combat state machine, rounds and ordering
//! - `context`: the context every processor receives
//! - `decision`: batched, concurrent decision requests
//! - `systems`: the processors
//! - `pipelines`: home, dungeon and social deduction processor lists
//! - `world_builder`: stages, actors and role assignment
//! - `game`: the host driver
//! - `config`, `logging`, `savegame`: ambient plumbing

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod combat;
pub mod components;
pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod events;
pub mod game;
pub mod history;
pub mod logging;
pub mod models;
pub mod pipelines;
pub mod savegame;
pub mod systems;
pub mod world_builder;

#[cfg(test)]
mod testing;

pub use combat::{CombatError, CombatResult, CombatSequence, CombatState, Round};
pub use config::GameConfig;
pub use context::GameContext;
pub use error::{GameError, Result};
pub use game::Game;
pub use history::AgentHistory;
pub use world_builder::WorldSpec;
