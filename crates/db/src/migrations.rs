use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use super::{run_pending, MIGRATOR};
    use crate::{connect_with_settings, DbPool};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "workflow_request",
        "approval_event",
        "idx_workflow_request_status",
        "idx_workflow_request_department_id",
        "idx_workflow_request_current_approver_role",
        "idx_approval_event_occurred_at",
    ];

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        pool
    }

    /// `(type, name, sql)` of every managed table and index, sorted.
    async fn schema_signature(pool: &DbPool) -> Vec<(String, String, String)> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT type, name, IFNULL(sql, '') FROM sqlite_master
             WHERE type IN ('table', 'index') ORDER BY type, name",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects");

        rows.into_iter()
            .filter(|(_, name, _)| MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn up_creates_every_managed_object_and_is_idempotent() {
        let pool = migrated_pool().await;
        let first = schema_signature(&pool).await;
        assert_eq!(first.len(), MANAGED_SCHEMA_OBJECTS.len());

        run_pending(&pool).await.expect("second run is a no-op");
        assert_eq!(schema_signature(&pool).await, first);
    }

    #[tokio::test]
    async fn down_then_up_restores_the_same_schema() {
        let pool = migrated_pool().await;
        let initial = schema_signature(&pool).await;

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert!(schema_signature(&pool).await.is_empty(), "full undo drops managed objects");

        run_pending(&pool).await.expect("re-run migrations");
        assert_eq!(schema_signature(&pool).await, initial);
    }

    #[tokio::test]
    async fn deleting_a_request_cascades_to_its_events() {
        let pool = migrated_pool().await;
        sqlx::query(
            "INSERT INTO workflow_request (id, kind, status, version, requester_id, department_id,
                                           snapshot_json, created_at, updated_at)
             VALUES ('REQ-1', 'seminar', 'pending_head', 1, 'u-1', 'dept-cs', '{}',
                     '2031-01-01T00:00:00Z', '2031-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert request");
        sqlx::query(
            "INSERT INTO approval_event (request_id, sequence, action, actor_role, actor_id,
                                         from_status, to_status, occurred_at, event_json)
             VALUES ('REQ-1', 0, 'submit', 'requester', 'u-1', 'draft', 'pending_head',
                     '2031-01-01T00:00:00Z', '{}')",
        )
        .execute(&pool)
        .await
        .expect("insert event");

        sqlx::query("DELETE FROM workflow_request WHERE id = 'REQ-1'")
            .execute(&pool)
            .await
            .expect("delete request");

        let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM approval_event")
            .fetch_one(&pool)
            .await
            .expect("count events");
        assert_eq!(remaining, 0);
    }
}
