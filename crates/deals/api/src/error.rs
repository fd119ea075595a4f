//! Error types for deal engine operations.

use std::io;

use stowage_primitives::ContentId;

/// Error type for deal engine operations.
#[derive(Debug, thiserror::Error)]
pub enum DealError {
    /// Reading the ingested payload failed.
    #[error("payload stream error: {0}")]
    Payload(#[from] io::Error),

    /// The engine could not persist the payload.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Deal placement against the market failed.
    #[error("market error: {message}")]
    Market {
        /// Description of the market failure.
        message: String,
    },

    /// A watched proposal is not known to the engine.
    #[error("unknown proposal: {proposal}")]
    UnknownProposal {
        /// The identifier that could not be resolved.
        proposal: ContentId,
    },

    /// Opening an update subscription failed.
    #[error("subscription error: {message}")]
    Subscription {
        /// Description of the subscription failure.
        message: String,
    },
}

/// Result type for deal engine operations.
pub type DealResult<T> = Result<T, DealError>;
