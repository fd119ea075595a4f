//! The deal engine trait.

use stowage_primitives::ContentId;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::{AskQuery, DealConfig, DealResult, DealUpdate, StorageAsk, StoreOutcome};

/// A deal-making engine: ingests payloads, places storage deals and reports
/// on their progress.
#[async_trait::async_trait]
pub trait DealEngine: Send + Sync + 'static {
    /// Ingest `data` on behalf of `address`, proposing one deal per config.
    ///
    /// `data` is consumed incrementally; implementations must not assume the
    /// full payload is buffered up front. Returns the content identifiers of
    /// the ingested payload and the deal configs as accepted (possibly
    /// adjusted) by the engine.
    async fn store<R>(
        &self,
        address: &str,
        data: R,
        configs: Vec<DealConfig>,
        duration: u64,
    ) -> DealResult<StoreOutcome>
    where
        R: AsyncRead + Send + Unpin + 'static;

    /// List asks currently available on the market, filtered by `query`.
    async fn available_asks(&self, query: AskQuery) -> DealResult<Vec<StorageAsk>>;

    /// Subscribe to state updates for the given deal proposals.
    ///
    /// The returned channel closes once no further updates will be produced
    /// for these proposals. Dropping the receiver cancels the subscription.
    async fn watch(&self, proposals: Vec<ContentId>) -> DealResult<mpsc::Receiver<DealUpdate>>;
}
