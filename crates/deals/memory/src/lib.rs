//! In-memory deal engine for development nodes and tests.
//!
//! Content-addresses incoming payloads with SHA-256 while streaming them,
//! records one deal per requested config and replays deal state changes
//! over a broadcast bus. Nothing is persisted; a restart forgets every
//! payload and deal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use stowage_deals_api::{
    AskQuery, DealConfig, DealEngine, DealError, DealResult, DealUpdate, StorageAsk, StoreOutcome,
};
use stowage_primitives::ContentId;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Deal state ladder replayed by [`MemoryDealEngine::advance`].
const DEAL_STATES: &[(u64, &str)] = &[
    (1, "proposed"),
    (2, "accepted"),
    (3, "sealing"),
    (4, "active"),
];

/// Updates buffered on the shared bus before old ones are dropped for
/// lagging subscribers.
const UPDATE_BUS_DEPTH: usize = 256;

/// Updates buffered per subscription before the bus-side forwarder blocks.
const SUBSCRIPTION_DEPTH: usize = 64;

/// Read granularity for payload ingestion.
const READ_CHUNK: usize = 8 * 1024;

/// A deal engine keeping everything in process memory.
#[derive(Clone)]
pub struct MemoryDealEngine {
    inner: Arc<Inner>,
}

struct Inner {
    blobs: RwLock<HashMap<ContentId, Bytes>>,
    deals: RwLock<HashMap<ContentId, DealRecord>>,
    asks: Vec<StorageAsk>,
    updates: broadcast::Sender<DealUpdate>,
}

#[derive(Debug, Clone)]
struct DealRecord {
    proposal: ContentId,
    miner: String,
    piece: ContentId,
    size: u64,
    price_per_epoch: u64,
    duration: u64,
    state: usize,
}

impl DealRecord {
    fn to_update(&self) -> DealUpdate {
        let (state_id, state_name) = DEAL_STATES[self.state.min(DEAL_STATES.len() - 1)];
        DealUpdate {
            proposal: self.proposal,
            state_id,
            state_name: state_name.to_owned(),
            miner: self.miner.clone(),
            piece_ref: self.piece.to_string(),
            size: self.size,
            price_per_epoch: self.price_per_epoch,
            duration: self.duration,
        }
    }
}

impl Default for MemoryDealEngine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemoryDealEngine {
    /// Create an engine serving `asks` as its market.
    pub fn new(mut asks: Vec<StorageAsk>) -> Self {
        asks.sort_by_key(|ask| ask.price);
        let (updates, _) = broadcast::channel(UPDATE_BUS_DEPTH);
        Self {
            inner: Arc::new(Inner {
                blobs: RwLock::new(HashMap::new()),
                deals: RwLock::new(HashMap::new()),
                asks,
                updates,
            }),
        }
    }

    /// The stored payload for `id`, if any.
    pub fn payload(&self, id: &ContentId) -> Option<Bytes> {
        self.inner.blobs.read().get(id).cloned()
    }

    /// Step `proposal` to its next deal state and notify subscribers.
    ///
    /// Returns the resulting update; a deal already in its final state is
    /// returned as-is without a notification.
    pub fn advance(&self, proposal: &ContentId) -> DealResult<DealUpdate> {
        let mut deals = self.inner.deals.write();
        let record = deals
            .get_mut(proposal)
            .ok_or(DealError::UnknownProposal { proposal: *proposal })?;
        if record.state + 1 >= DEAL_STATES.len() {
            return Ok(record.to_update());
        }
        record.state += 1;
        let update = record.to_update();
        let _ = self.inner.updates.send(update.clone());
        Ok(update)
    }
}

fn proposal_id(piece: &ContentId, miner: &str) -> ContentId {
    let mut hasher = Sha256::new();
    hasher.update(piece.as_bytes());
    hasher.update(miner.as_bytes());
    ContentId::new(hasher.finalize().into())
}

#[async_trait::async_trait]
impl DealEngine for MemoryDealEngine {
    async fn store<R>(
        &self,
        address: &str,
        mut data: R,
        configs: Vec<DealConfig>,
        duration: u64,
    ) -> DealResult<StoreOutcome>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut hasher = Sha256::new();
        let mut payload = BytesMut::new();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = data.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            payload.extend_from_slice(&buf[..n]);
        }

        let piece = ContentId::new(hasher.finalize().into());
        let size = payload.len() as u64;
        self.inner.blobs.write().insert(piece, payload.freeze());

        let mut cids = Vec::with_capacity(configs.len());
        for config in &configs {
            let proposal = proposal_id(&piece, &config.miner);
            let record = DealRecord {
                proposal,
                miner: config.miner.clone(),
                piece,
                size,
                price_per_epoch: config.epoch_price,
                duration,
                state: 0,
            };
            let update = record.to_update();
            self.inner.deals.write().insert(proposal, record);
            let _ = self.inner.updates.send(update);
            cids.push(proposal);
        }

        debug!(%address, %piece, deals = cids.len(), size, "payload stored");
        Ok(StoreOutcome {
            cids,
            deal_configs: configs,
        })
    }

    async fn available_asks(&self, query: AskQuery) -> DealResult<Vec<StorageAsk>> {
        let asks = self
            .inner
            .asks
            .iter()
            .filter(|ask| query.max_price == 0 || ask.price <= query.max_price)
            .filter(|ask| query.piece_size == 0 || ask.min_piece_size <= query.piece_size)
            .skip(query.offset)
            .cloned();
        Ok(match query.limit {
            0 => asks.collect(),
            limit => asks.take(limit).collect(),
        })
    }

    async fn watch(&self, proposals: Vec<ContentId>) -> DealResult<mpsc::Receiver<DealUpdate>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_DEPTH);

        // Tail the bus before snapshotting so no state change can land in
        // between; a duplicated state is harmless, a missed one is not.
        let mut feed = self.inner.updates.subscribe();
        let mut snapshot = Vec::with_capacity(proposals.len());
        {
            let deals = self.inner.deals.read();
            for proposal in &proposals {
                let record = deals
                    .get(proposal)
                    .ok_or(DealError::UnknownProposal { proposal: *proposal })?;
                snapshot.push(record.to_update());
            }
        }

        let watched: HashSet<ContentId> = proposals.into_iter().collect();
        debug!(watched = watched.len(), "subscription opened");
        tokio::spawn(async move {
            for update in snapshot {
                if tx.send(update).await.is_err() {
                    return;
                }
            }
            loop {
                match feed.recv().await {
                    Ok(update) if watched.contains(&update.proposal) => {
                        if tx.send(update).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    fn config(miner: &str, epoch_price: u64) -> DealConfig {
        DealConfig {
            miner: miner.to_owned(),
            epoch_price,
        }
    }

    fn ask(miner: &str, price: u64, min_piece_size: u64) -> StorageAsk {
        StorageAsk {
            price,
            min_piece_size,
            miner: miner.to_owned(),
            timestamp: 1_700_000_000,
            expiry: 1_800_000_000,
        }
    }

    async fn store_simple(engine: &MemoryDealEngine, payload: &[u8]) -> StoreOutcome {
        engine
            .store(
                "addr1",
                Cursor::new(payload.to_vec()),
                vec![config("m1", 100)],
                1000,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn store_content_addresses_the_payload() {
        let engine = MemoryDealEngine::default();
        let outcome = store_simple(&engine, b"hello world").await;

        assert_eq!(outcome.cids.len(), 1);
        assert_eq!(outcome.deal_configs, vec![config("m1", 100)]);

        let piece = ContentId::new(Sha256::digest(b"hello world").into());
        assert_eq!(engine.payload(&piece).unwrap(), Bytes::from_static(b"hello world"));
        assert_eq!(outcome.cids[0], proposal_id(&piece, "m1"));
    }

    #[tokio::test]
    async fn store_proposes_one_deal_per_config() {
        let engine = MemoryDealEngine::default();
        let outcome = engine
            .store(
                "addr1",
                Cursor::new(b"payload".to_vec()),
                vec![config("m1", 100), config("m2", 120)],
                1000,
            )
            .await
            .unwrap();

        assert_eq!(outcome.cids.len(), 2);
        assert_ne!(outcome.cids[0], outcome.cids[1]);
    }

    #[tokio::test]
    async fn watch_rejects_unknown_proposals() {
        let engine = MemoryDealEngine::default();
        let missing = ContentId::new([9u8; 32]);
        let err = engine.watch(vec![missing]).await.unwrap_err();
        assert_matches!(err, DealError::UnknownProposal { proposal } if proposal == missing);
    }

    #[tokio::test]
    async fn watch_replays_state_then_follows_advances() {
        let engine = MemoryDealEngine::default();
        let outcome = store_simple(&engine, b"data").await;
        let proposal = outcome.cids[0];

        let mut updates = engine.watch(vec![proposal]).await.unwrap();

        let first = updates.recv().await.unwrap();
        assert_eq!(first.proposal, proposal);
        assert_eq!(first.state_name, "proposed");
        assert_eq!(first.size, 4);

        engine.advance(&proposal).unwrap();
        let second = updates.recv().await.unwrap();
        assert_eq!(second.state_name, "accepted");
    }

    #[tokio::test]
    async fn advance_stops_at_final_state() {
        let engine = MemoryDealEngine::default();
        let outcome = store_simple(&engine, b"data").await;
        let proposal = outcome.cids[0];

        for _ in 0..DEAL_STATES.len() {
            engine.advance(&proposal).unwrap();
        }
        let last = engine.advance(&proposal).unwrap();
        assert_eq!(last.state_name, "active");
    }

    #[tokio::test]
    async fn asks_filter_and_page() {
        let engine = MemoryDealEngine::new(vec![
            ask("m3", 300, 1024),
            ask("m1", 100, 256),
            ask("m2", 200, 512),
        ]);

        // Price-ascending, max_price bound.
        let asks = engine
            .available_asks(AskQuery {
                max_price: 250,
                ..AskQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(
            asks.iter().map(|a| a.miner.as_str()).collect::<Vec<_>>(),
            ["m1", "m2"]
        );

        // Piece-size bound keeps asks accepting pieces that small.
        let asks = engine
            .available_asks(AskQuery {
                piece_size: 512,
                ..AskQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(
            asks.iter().map(|a| a.miner.as_str()).collect::<Vec<_>>(),
            ["m1", "m2"]
        );

        // Offset + limit page through the filtered order.
        let asks = engine
            .available_asks(AskQuery {
                offset: 1,
                limit: 1,
                ..AskQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(asks[0].miner, "m2");
    }
}
