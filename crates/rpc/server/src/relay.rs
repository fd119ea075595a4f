//! Server-streamed relaying of deal state updates.
//!
//! Proposal identifiers are resolved before anything is opened against the
//! engine; the outbound stream then forwards updates one-for-one, in
//! arrival order, until the engine closes its channel. Dropping the stream
//! (peer disconnect) drops the subscription with it, so the engine stops
//! being polled in the same scheduling step.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use stowage_deals_api::DealEngine;
use stowage_primitives::ContentId;
use tonic::Status;
use tracing::debug;

use crate::convert;
use crate::proto::deals::WatchReply;

/// Outbound message stream of a watch interaction.
pub(crate) type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchReply, Status>> + Send>>;

/// Turns an engine subscription into an outbound message stream.
pub(crate) struct SubscriptionRelay<E> {
    engine: Arc<E>,
}

impl<E: DealEngine> SubscriptionRelay<E> {
    pub(crate) fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    pub(crate) async fn run(self, proposals: Vec<String>) -> Result<WatchStream, Status> {
        let mut ids = Vec::with_capacity(proposals.len());
        for raw in &proposals {
            let id: ContentId = raw.parse().map_err(|err| {
                Status::invalid_argument(format!("invalid proposal id {raw:?}: {err}"))
            })?;
            ids.push(id);
        }

        let mut updates = self
            .engine
            .watch(ids)
            .await
            .map_err(convert::status_from_deal_error)?;
        debug!(proposals = proposals.len(), "watch subscription opened");

        Ok(Box::pin(async_stream::stream! {
            // A closed channel is normal completion; no terminal message
            // and no synthesized error.
            while let Some(update) = updates.recv().await {
                metrics::counter!("stowage_watch_updates_total").increment(1);
                yield Ok(convert::watch_reply(update));
            }
        }))
    }
}
