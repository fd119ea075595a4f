//! Service health probing.

use std::collections::HashMap;

use parking_lot::RwLock;
use tonic::{Request, Response, Status};

use crate::proto::health::{
    health_check_response::ServingStatus, health_server::Health, HealthCheckRequest,
    HealthCheckResponse,
};

/// Tracks serving status for the server and its named services.
#[derive(Debug, Default)]
pub struct HealthService {
    statuses: RwLock<HashMap<String, ServingStatus>>,
}

impl HealthService {
    /// Create a health service already marked as serving overall.
    pub fn serving() -> Self {
        let service = Self::default();
        service.set_status("", ServingStatus::Serving);
        service
    }

    /// Record the status of a named service; the empty name is the server
    /// as a whole.
    pub fn set_status(&self, service: impl Into<String>, status: ServingStatus) {
        self.statuses.write().insert(service.into(), status);
    }
}

#[tonic::async_trait]
impl Health for HealthService {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let service = &request.get_ref().service;
        match self.statuses.read().get(service) {
            Some(status) => Ok(Response::new(HealthCheckResponse {
                status: (*status).into(),
            })),
            None => Err(Status::not_found(format!("unknown service: {service:?}"))),
        }
    }
}
