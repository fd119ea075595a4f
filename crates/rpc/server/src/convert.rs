//! Conversions between wire messages and deal engine types.

use stowage_deals_api::{AskQuery, DealConfig, DealError, DealUpdate, StorageAsk, StoreOutcome};
use tonic::Status;

use crate::proto::deals;

pub(crate) fn deal_config_from_wire(config: deals::DealConfig) -> DealConfig {
    DealConfig {
        miner: config.miner,
        epoch_price: config.epoch_price,
    }
}

pub(crate) fn deal_config_to_wire(config: DealConfig) -> deals::DealConfig {
    deals::DealConfig {
        miner: config.miner,
        epoch_price: config.epoch_price,
    }
}

pub(crate) fn store_reply(outcome: StoreOutcome) -> deals::StoreReply {
    deals::StoreReply {
        cids: outcome.cids.iter().map(ToString::to_string).collect(),
        deal_configs: outcome
            .deal_configs
            .into_iter()
            .map(deal_config_to_wire)
            .collect(),
    }
}

pub(crate) fn ask_query_from_wire(query: deals::AskQuery) -> AskQuery {
    AskQuery {
        max_price: query.max_price,
        piece_size: query.piece_size,
        limit: query.limit.max(0) as usize,
        offset: query.offset.max(0) as usize,
    }
}

pub(crate) fn storage_ask_to_wire(ask: StorageAsk) -> deals::StorageAsk {
    deals::StorageAsk {
        price: ask.price,
        min_piece_size: ask.min_piece_size,
        miner: ask.miner,
        timestamp: ask.timestamp,
        expiry: ask.expiry,
    }
}

pub(crate) fn watch_reply(update: DealUpdate) -> deals::WatchReply {
    deals::WatchReply {
        deal_info: Some(deals::DealInfo {
            proposal_cid: update.proposal.to_string(),
            state_id: update.state_id,
            state_name: update.state_name,
            miner: update.miner,
            piece_ref: update.piece_ref,
            size: update.size,
            price_per_epoch: update.price_per_epoch,
            duration: update.duration,
        }),
    }
}

/// Map engine failures onto gRPC status codes.
///
/// The message is passed through verbatim; this layer adds no retry and no
/// rewording.
pub(crate) fn status_from_deal_error(err: DealError) -> Status {
    match err {
        DealError::UnknownProposal { .. } => Status::not_found(err.to_string()),
        DealError::Payload(_)
        | DealError::Storage { .. }
        | DealError::Market { .. }
        | DealError::Subscription { .. } => Status::internal(err.to_string()),
    }
}
