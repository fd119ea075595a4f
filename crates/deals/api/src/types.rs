//! Domain types crossing the engine boundary.

use stowage_primitives::ContentId;

/// Per-miner deal parameters supplied by the caller.
///
/// Immutable once constructed; the engine echoes the configs it accepted
/// (possibly adjusted) back in the [`StoreOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealConfig {
    /// Miner the deal is proposed to.
    pub miner: String,
    /// Price offered per epoch.
    pub epoch_price: u64,
}

/// Successful outcome of a store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    /// Content identifiers produced for the ingested payload, one per
    /// placed deal; valid inputs to [`crate::DealEngine::watch`].
    pub cids: Vec<ContentId>,
    /// Deal configs as accepted by the engine, in proposal order.
    pub deal_configs: Vec<DealConfig>,
}

/// A state-change notification for a watched deal proposal.
///
/// Forwarded to subscribers and then discarded; the engine retains no
/// delivery state per update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealUpdate {
    /// The deal proposal this update refers to.
    pub proposal: ContentId,
    /// Numeric deal state.
    pub state_id: u64,
    /// Human-readable name of the state.
    pub state_name: String,
    /// Miner the deal was placed with.
    pub miner: String,
    /// Reference to the piece the deal covers.
    pub piece_ref: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Agreed price per epoch.
    pub price_per_epoch: u64,
    /// Deal duration in epochs.
    pub duration: u64,
}

/// Market filter for [`crate::DealEngine::available_asks`].
///
/// Zero values leave the corresponding bound open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AskQuery {
    /// Only return asks at or below this price.
    pub max_price: u64,
    /// Only return asks accepting pieces of this size.
    pub piece_size: u64,
    /// Maximum number of asks to return.
    pub limit: usize,
    /// Number of matching asks to skip.
    pub offset: usize,
}

/// A miner's standing storage offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAsk {
    /// Asking price per epoch.
    pub price: u64,
    /// Smallest piece the miner accepts.
    pub min_piece_size: u64,
    /// Miner making the offer.
    pub miner: String,
    /// When the ask was published (unix seconds).
    pub timestamp: u64,
    /// When the ask expires (unix seconds).
    pub expiry: u64,
}
