//! # Vigil Core Library
//!
//! NPC visual-perception and alerting pipeline for stealth games.
//!
//! Every NPC gets a [`VisualSensor`] that decides, each simulation tick,
//! what the NPC can see, how confident it is, how its vigilance escalates
//! and decays, which of several candidate targets it should act on, and
//! when to tell the rest of the game about it:
//!
//! - **Visibility** — geometric and lighting sight scoring
//! - **Detection** — multi-factor per-candidate detection scores
//! - **Alert** — hysteretic multi-phase vigilance state machine
//! - **Memory** — tiered sighting store with decay and prediction
//! - **Tracking** — bounded multi-target set with dynamic priority
//! - **Events** — cooldown-throttled outward notifications
//!
//! ## Performance Contract
//!
//! All operations are designed for real-time game use:
//! - Per-tick cost bounded regardless of candidate count (batched scoring)
//! - Detection score, single candidate: < 5μs
//! - Memory decay pass (50 entries): < 20μs
//! - No allocation on the scoring and cleanup paths (pooled target
//!   records, in-place batch iteration); candidate refresh allocates only
//!   through the scene's overlap query

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alert;
pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod memory;
pub mod sensor;
pub mod target;
pub mod tracking;
pub mod types;
pub mod visibility;
pub mod world;

pub use config::SensorConfig;
pub use error::VigilError;
pub use events::Notification;
pub use sensor::VisualSensor;
pub use types::*;
