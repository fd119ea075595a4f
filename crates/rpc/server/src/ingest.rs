//! Client-streamed ingestion of store payloads.
//!
//! The coordinator validates the protocol shape, launches the engine call
//! against the read half of a chunk pipe and pumps inbound chunks into the
//! write half. The engine result comes back over a one-shot channel; the
//! background task sends on every path, so the terminal wait cannot hang.

use std::io;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use stowage_deals_api::{DealEngine, DealResult, StoreOutcome};
use tokio::sync::oneshot;
use tonic::Status;
use tracing::debug;

use crate::convert;
use crate::pipe::{self, PipeReader};
use crate::proto::deals::{store_request, StoreParams, StoreReply, StoreRequest};

/// Chunks buffered between the inbound loop and the engine before the
/// writer blocks.
const PIPE_DEPTH: usize = 16;

/// Drives one store interaction to its single terminal reply.
pub(crate) struct IngestionCoordinator<E> {
    engine: Arc<E>,
}

impl<E: DealEngine> IngestionCoordinator<E> {
    pub(crate) fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    pub(crate) async fn run<S>(self, mut inbound: S) -> Result<StoreReply, Status>
    where
        S: Stream<Item = Result<StoreRequest, Status>> + Unpin,
    {
        // The first message must carry the deal parameters; nothing is
        // spawned until they check out.
        let params = match inbound.next().await {
            Some(Ok(StoreRequest {
                payload: Some(store_request::Payload::Params(params)),
            })) => params,
            Some(Ok(other)) => {
                return Err(Status::invalid_argument(format!(
                    "expected store params as first message, got {}",
                    payload_name(&other)
                )));
            }
            Some(Err(status)) => return Err(status),
            None => return Err(Status::invalid_argument("store stream closed before params")),
        };

        let (mut writer, reader) = pipe::chunk_pipe(PIPE_DEPTH);
        let (result_tx, result_rx) = oneshot::channel();
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let result = ingest(engine, params, reader).await;
            // The receiver is gone if the interaction aborted on a protocol
            // violation; nothing is owed to anyone then.
            let _ = result_tx.send(result);
        });

        let mut chunks: u64 = 0;
        loop {
            match inbound.next().await {
                Some(Ok(msg)) => match msg.payload {
                    Some(store_request::Payload::Chunk(data)) => {
                        metrics::counter!("stowage_store_chunks_total").increment(1);
                        metrics::counter!("stowage_store_bytes_total")
                            .increment(data.len() as u64);
                        chunks += 1;
                        writer.write(data.into()).await.map_err(|err| {
                            Status::internal(format!("chunk handoff failed: {err}"))
                        })?;
                    }
                    _ => {
                        return Err(Status::invalid_argument(
                            "expected chunk payload after store params",
                        ));
                    }
                },
                None => {
                    writer.close();
                    break;
                }
                Some(Err(status)) => {
                    writer.close_with_error(io::Error::new(
                        io::ErrorKind::Other,
                        status.message().to_owned(),
                    ));
                    break;
                }
            }
        }
        debug!(chunks, "store stream drained, awaiting engine");

        let outcome = result_rx
            .await
            .map_err(|_| Status::internal("store task exited without a result"))?
            .map_err(convert::status_from_deal_error)?;

        Ok(convert::store_reply(outcome))
    }
}

/// Background half of a store interaction; owns the pipe reader.
async fn ingest<E: DealEngine>(
    engine: Arc<E>,
    params: StoreParams,
    data: PipeReader,
) -> DealResult<StoreOutcome> {
    let configs = params
        .deal_configs
        .into_iter()
        .map(convert::deal_config_from_wire)
        .collect();
    engine
        .store(&params.address, data, configs, params.duration)
        .await
}

fn payload_name(req: &StoreRequest) -> &'static str {
    match req.payload {
        Some(store_request::Payload::Params(_)) => "params",
        Some(store_request::Payload::Chunk(_)) => "chunk",
        None => "an empty payload",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use sha2::{Digest, Sha256};
    use std::sync::atomic::{AtomicBool, Ordering};
    use stowage_deals_api::{AskQuery, DealConfig, DealError, DealUpdate, StorageAsk};
    use stowage_deals_memory::MemoryDealEngine;
    use stowage_primitives::ContentId;
    use tokio::io::{AsyncRead, AsyncReadExt};
    use tokio::sync::mpsc;
    use tonic::Code;

    use crate::proto::deals;

    /// Engine double: drains the payload, then succeeds or fails on cue.
    struct ScriptedEngine {
        fail_store: bool,
        started: AtomicBool,
        seen: Mutex<Vec<u8>>,
    }

    impl ScriptedEngine {
        fn echoing() -> Arc<Self> {
            Arc::new(Self {
                fail_store: false,
                started: AtomicBool::new(false),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail_store: true,
                started: AtomicBool::new(false),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl DealEngine for ScriptedEngine {
        async fn store<R>(
            &self,
            _address: &str,
            mut data: R,
            configs: Vec<DealConfig>,
            _duration: u64,
        ) -> DealResult<StoreOutcome>
        where
            R: AsyncRead + Send + Unpin + 'static,
        {
            self.started.store(true, Ordering::SeqCst);
            let mut payload = Vec::new();
            data.read_to_end(&mut payload).await?;
            *self.seen.lock() = payload;
            if self.fail_store {
                return Err(DealError::Market {
                    message: "no miner accepted".to_owned(),
                });
            }
            Ok(StoreOutcome {
                cids: vec![ContentId::new([7u8; 32])],
                deal_configs: configs,
            })
        }

        async fn available_asks(&self, _query: AskQuery) -> DealResult<Vec<StorageAsk>> {
            Ok(Vec::new())
        }

        async fn watch(
            &self,
            _proposals: Vec<ContentId>,
        ) -> DealResult<mpsc::Receiver<DealUpdate>> {
            Err(DealError::Subscription {
                message: "not scripted".to_owned(),
            })
        }
    }

    fn params_msg() -> StoreRequest {
        StoreRequest {
            payload: Some(store_request::Payload::Params(StoreParams {
                address: "addr1".to_owned(),
                deal_configs: vec![deals::DealConfig {
                    miner: "m1".to_owned(),
                    epoch_price: 100,
                }],
                duration: 1000,
            })),
        }
    }

    fn chunk_msg(data: &[u8]) -> StoreRequest {
        StoreRequest {
            payload: Some(store_request::Payload::Chunk(data.to_vec())),
        }
    }

    fn inbound(
        messages: Vec<Result<StoreRequest, Status>>,
    ) -> impl Stream<Item = Result<StoreRequest, Status>> + Unpin {
        futures_util::stream::iter(messages)
    }

    #[tokio::test]
    async fn streams_chunks_to_engine_and_replies() {
        let engine = ScriptedEngine::echoing();
        let reply = IngestionCoordinator::new(engine.clone())
            .run(inbound(vec![
                Ok(params_msg()),
                Ok(chunk_msg(b"ab")),
                Ok(chunk_msg(b"cd")),
            ]))
            .await
            .unwrap();

        assert_eq!(*engine.seen.lock(), b"abcd");
        assert_eq!(reply.cids, vec![ContentId::new([7u8; 32]).to_string()]);
        assert_eq!(
            reply.deal_configs,
            vec![deals::DealConfig {
                miner: "m1".to_owned(),
                epoch_price: 100,
            }]
        );
    }

    #[tokio::test]
    async fn accepts_an_empty_payload() {
        let engine = ScriptedEngine::echoing();
        let reply = IngestionCoordinator::new(engine.clone())
            .run(inbound(vec![Ok(params_msg())]))
            .await
            .unwrap();

        assert!(engine.seen.lock().is_empty());
        assert_eq!(reply.cids.len(), 1);
    }

    #[tokio::test]
    async fn rejects_a_chunk_as_first_message() {
        let engine = ScriptedEngine::echoing();
        let err = IngestionCoordinator::new(engine.clone())
            .run(inbound(vec![Ok(chunk_msg(b"ab"))]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::InvalidArgument);
        // Nothing was spawned before validation failed.
        assert!(!engine.started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rejects_an_empty_stream() {
        let engine = ScriptedEngine::echoing();
        let err = IngestionCoordinator::new(engine)
            .run(inbound(vec![]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn rejects_params_sent_twice() {
        let engine = ScriptedEngine::echoing();
        let err = IngestionCoordinator::new(engine)
            .run(inbound(vec![Ok(params_msg()), Ok(params_msg())]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn propagates_an_engine_failure() {
        let engine = ScriptedEngine::failing();
        let err = IngestionCoordinator::new(engine)
            .run(inbound(vec![Ok(params_msg()), Ok(chunk_msg(b"xy"))]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().contains("no miner accepted"));
    }

    #[tokio::test]
    async fn inbound_stream_error_reaches_the_engine() {
        let engine = ScriptedEngine::echoing();
        let err = IngestionCoordinator::new(engine.clone())
            .run(inbound(vec![
                Ok(params_msg()),
                Ok(chunk_msg(b"ab")),
                Err(Status::aborted("client hung up")),
            ]))
            .await
            .unwrap_err();

        // The engine's payload read fails with the transport error, which
        // comes back as the terminal status.
        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().contains("client hung up"));
        assert!(engine.started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stores_through_the_memory_engine() {
        let engine = Arc::new(MemoryDealEngine::default());
        let reply = IngestionCoordinator::new(engine.clone())
            .run(inbound(vec![
                Ok(params_msg()),
                Ok(chunk_msg(b"ab")),
                Ok(chunk_msg(b"cd")),
            ]))
            .await
            .unwrap();

        assert_eq!(reply.cids.len(), 1);
        assert_matches!(reply.cids[0].parse::<ContentId>(), Ok(_));

        // The engine saw the concatenated payload, content-addressed.
        let piece = ContentId::new(Sha256::digest(b"abcd").into());
        assert_eq!(engine.payload(&piece).unwrap().as_ref(), b"abcd");
    }
}
