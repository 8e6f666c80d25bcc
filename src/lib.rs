//! # barbershop
//!
//! A coalescing priority work-queue served over a text line protocol.
//!
//! Producers submit score increments keyed by an integer item id; repeated
//! submissions for one id accumulate into a single pending entry. A consumer
//! repeatedly drains the item with the highest accumulated score.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod telemetry;

pub use engine::{Engine, SubmitResult};
pub use error::{Error, Result};
pub use model::{Item, ItemId, Score};
