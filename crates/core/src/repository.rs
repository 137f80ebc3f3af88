use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{Request, RequestId};
use crate::domain::status::RequestStatus;

/// The stored state a write is conditioned on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub version: u64,
    pub status: RequestStatus,
}

impl Revision {
    pub fn of(request: &Request) -> Self {
        Self { version: request.version, status: request.status }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("concurrency conflict on request {request_id}: {detail}")]
    ConcurrencyConflict { request_id: String, detail: String },
    #[error("backend error: {0}")]
    Backend(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Request store with an optimistic-concurrency write contract.
///
/// `save` with `expected = Some(revision)` must succeed only when the stored
/// row still carries that version and status. `expected = None` inserts a new
/// request and conflicts if the id is already taken. Conflicts are never
/// merged.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn load(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError>;
    async fn save(
        &self,
        request: &Request,
        expected: Option<&Revision>,
    ) -> Result<(), RepositoryError>;
}
