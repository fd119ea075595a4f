//! Deal engine boundary for stowage nodes.
//!
//! This crate defines the seam between the RPC layer and whatever performs
//! the actual deal making: the [`DealEngine`] trait, the domain types that
//! cross it, and the [`DealError`] taxonomy. The RPC layer only adapts
//! streams to and from these three operations; deal placement, pricing and
//! persistence live behind the trait.

mod engine;
mod error;
mod types;

pub use engine::DealEngine;
pub use error::{DealError, DealResult};
pub use types::{AskQuery, DealConfig, DealUpdate, StorageAsk, StoreOutcome};
