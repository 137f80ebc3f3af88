use std::collections::HashMap;

use tokio::sync::RwLock;

use travelink_core::domain::request::{Request, RequestId};
use travelink_core::repository::{RepositoryError, RequestRepository, Revision};

/// Process-local store honoring the same conditional-write contract as the
/// SQL repository.
#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, Request>>,
}

impl InMemoryRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn load(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(
        &self,
        request: &Request,
        expected: Option<&Revision>,
    ) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        let stored = requests.get(&request.id.0).map(Revision::of);

        match (expected, stored) {
            (None, Some(_)) => {
                return Err(RepositoryError::ConcurrencyConflict {
                    request_id: request.id.0.clone(),
                    detail: "request already exists".to_string(),
                });
            }
            (Some(_), None) => {
                return Err(RepositoryError::ConcurrencyConflict {
                    request_id: request.id.0.clone(),
                    detail: "request no longer exists".to_string(),
                });
            }
            (Some(expected), Some(stored)) if &stored != expected => {
                return Err(RepositoryError::ConcurrencyConflict {
                    request_id: request.id.0.clone(),
                    detail: format!(
                        "expected version {} ({}), found version {} ({})",
                        expected.version, expected.status, stored.version, stored.status
                    ),
                });
            }
            _ => {}
        }

        requests.insert(request.id.0.clone(), request.clone());
        Ok(())
    }
}
