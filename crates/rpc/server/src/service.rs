//! Deal API service implementation.

use std::sync::Arc;

use stowage_deals_api::DealEngine;
use tonic::{Request, Response, Status, Streaming};

use crate::convert;
use crate::ingest::IngestionCoordinator;
use crate::proto::deals::{
    deal_api_server::DealApi, AvailableAsksReply, AvailableAsksRequest, StoreReply, StoreRequest,
    WatchRequest,
};
use crate::relay::SubscriptionRelay;

/// gRPC surface over a [`DealEngine`].
///
/// Thin glue: protocol orchestration lives in the ingestion coordinator
/// and the subscription relay.
pub struct DealApiService<E> {
    engine: Arc<E>,
}

impl<E> DealApiService<E> {
    /// Create a deal API service backed by `engine`.
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }
}

#[tonic::async_trait]
impl<E: DealEngine> DealApi for DealApiService<E> {
    async fn store(
        &self,
        request: Request<Streaming<StoreRequest>>,
    ) -> Result<Response<StoreReply>, Status> {
        let reply = IngestionCoordinator::new(self.engine.clone())
            .run(request.into_inner())
            .await?;
        Ok(Response::new(reply))
    }

    async fn available_asks(
        &self,
        request: Request<AvailableAsksRequest>,
    ) -> Result<Response<AvailableAsksReply>, Status> {
        let query = convert::ask_query_from_wire(request.into_inner().query.unwrap_or_default());
        let asks = self
            .engine
            .available_asks(query)
            .await
            .map_err(convert::status_from_deal_error)?;
        Ok(Response::new(AvailableAsksReply {
            asks: asks.into_iter().map(convert::storage_ask_to_wire).collect(),
        }))
    }

    type WatchStream = crate::relay::WatchStream;

    async fn watch(
        &self,
        request: Request<WatchRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        let stream = SubscriptionRelay::new(self.engine.clone())
            .run(request.into_inner().proposals)
            .await?;
        Ok(Response::new(stream))
    }
}
