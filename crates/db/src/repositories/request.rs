use sqlx::Row;
use tracing::debug;

use travelink_core::domain::request::{Request, RequestId};
use travelink_core::domain::status::RequestStatus;
use travelink_core::repository::{RepositoryError, RequestRepository, Revision};

use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Ids of requests currently waiting in `status`, oldest update first.
    pub async fn ids_with_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<RequestId>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id FROM workflow_request WHERE status = ? ORDER BY updated_at ASC, id ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map(RequestId).map_err(decode))
            .collect()
    }

    pub async fn event_count(&self, id: &RequestId) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM approval_event WHERE request_id = ?")
            .bind(&id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        row.try_get("total").map_err(decode)
    }
}

fn backend(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(error.to_string())
}

fn decode(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn conflict(request: &Request, detail: impl Into<String>) -> RepositoryError {
    RepositoryError::ConcurrencyConflict { request_id: request.id.0.clone(), detail: detail.into() }
}

fn to_i64(value: u64, field: &str) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| RepositoryError::Backend(format!("{field} out of range")))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<Request, RepositoryError> {
    let snapshot: String = row.try_get("snapshot_json").map_err(decode)?;
    let version: i64 = row.try_get("version").map_err(decode)?;

    let mut request: Request = serde_json::from_str(&snapshot)
        .map_err(|error| RepositoryError::Decode(format!("request snapshot: {error}")))?;
    request.version = u64::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("negative version {version}")))?;
    Ok(request)
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn load(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query("SELECT snapshot_json, version FROM workflow_request WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        request: &Request,
        expected: Option<&Revision>,
    ) -> Result<(), RepositoryError> {
        let snapshot = serde_json::to_string(request)
            .map_err(|error| RepositoryError::Backend(format!("request snapshot: {error}")))?;
        let version = to_i64(request.version, "version")?;
        let approver_role = request.current_approver_role.map(|role| role.as_str());

        let mut tx = self.pool.begin().await.map_err(backend)?;

        let written = match expected {
            None => sqlx::query(
                "INSERT INTO workflow_request (id, kind, status, version, requester_id,
                                               department_id, current_approver_role,
                                               snapshot_json, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(&request.id.0)
            .bind(request.kind().as_str())
            .bind(request.status.as_str())
            .bind(version)
            .bind(&request.requester_id)
            .bind(&request.department_id)
            .bind(approver_role)
            .bind(&snapshot)
            .bind(request.created_at.to_rfc3339())
            .bind(request.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(backend)?
            .rows_affected(),
            Some(revision) => sqlx::query(
                "UPDATE workflow_request
                 SET status = ?, version = ?, current_approver_role = ?,
                     snapshot_json = ?, updated_at = ?
                 WHERE id = ? AND version = ? AND status = ?",
            )
            .bind(request.status.as_str())
            .bind(version)
            .bind(approver_role)
            .bind(&snapshot)
            .bind(request.updated_at.to_rfc3339())
            .bind(&request.id.0)
            .bind(to_i64(revision.version, "expected version")?)
            .bind(revision.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?
            .rows_affected(),
        };

        if written == 0 {
            tx.rollback().await.map_err(backend)?;
            debug!(
                event_name = "db.request.write_conflict",
                request_id = %request.id.0,
                expected_version = ?expected.map(|revision| revision.version),
                "conditional request write matched no row"
            );
            return Err(match expected {
                None => conflict(request, "request already exists"),
                Some(revision) => conflict(
                    request,
                    format!(
                        "stored row no longer at version {} ({})",
                        revision.version, revision.status
                    ),
                ),
            });
        }

        for (sequence, event) in request.history.iter().enumerate() {
            let event_json = serde_json::to_string(event)
                .map_err(|error| RepositoryError::Backend(format!("approval event: {error}")))?;
            sqlx::query(
                "INSERT INTO approval_event (request_id, sequence, action, actor_role, actor_id,
                                             from_status, to_status, next_approver_role,
                                             occurred_at, event_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(request_id, sequence) DO NOTHING",
            )
            .bind(&request.id.0)
            .bind(to_i64(sequence as u64, "event sequence")?)
            .bind(event.action.as_str())
            .bind(event.actor_role.as_str())
            .bind(&event.actor_id)
            .bind(event.from_status.as_str())
            .bind(event.to_status.as_str())
            .bind(event.next_approver_role.map(|role| role.as_str()))
            .bind(event.at.to_rfc3339())
            .bind(&event_json)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}
