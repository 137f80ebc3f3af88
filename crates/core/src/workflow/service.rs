use tracing::{info, warn};

use crate::domain::event::WorkflowAction;
use crate::domain::request::{Request, RequestId};
use crate::domain::role::{Actor, ActorRole};
use crate::domain::status::RequestStatus;
use crate::errors::{ApplicationError, DomainError};
use crate::notify::{Notification, NotificationDispatcher};
use crate::repository::{RequestRepository, Revision};
use crate::workflow::policy::DepartmentPolicy;
use crate::workflow::processor::{ActionPayload, ApprovalActionProcessor};

/// Sequences load → apply → conditional save → notify for one request.
/// Conflicts surface to the caller; nothing is retried here.
pub struct WorkflowService<R, N, P> {
    repository: R,
    notifier: N,
    processor: ApprovalActionProcessor<P>,
}

impl<R, N, P> WorkflowService<R, N, P>
where
    R: RequestRepository,
    N: NotificationDispatcher,
    P: DepartmentPolicy,
{
    pub fn new(repository: R, notifier: N, processor: ApprovalActionProcessor<P>) -> Self {
        Self { repository, notifier, processor }
    }

    pub fn processor(&self) -> &ApprovalActionProcessor<P> {
        &self.processor
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn create(&self, request: Request) -> Result<Request, ApplicationError> {
        if request.status != RequestStatus::Draft || !request.history.is_empty() {
            return Err(DomainError::InvariantViolation(
                "new requests must start as an empty draft".to_string(),
            )
            .into());
        }

        self.repository.save(&request, None).await?;
        info!(
            event_name = "workflow.request.created",
            request_id = %request.id.0,
            kind = ?request.kind(),
            "request draft created"
        );
        Ok(request)
    }

    pub async fn load(&self, id: &RequestId) -> Result<Request, ApplicationError> {
        self.repository.load(id).await?.ok_or_else(|| ApplicationError::NotFound(id.0.clone()))
    }

    pub async fn act(
        &self,
        id: &RequestId,
        action: WorkflowAction,
        actor: &Actor,
        payload: &ActionPayload,
        correlation_id: &str,
    ) -> Result<Request, ApplicationError> {
        let current = self.load(id).await?;
        let expected = Revision::of(&current);

        let updated = match self.processor.apply(&current, action, actor, payload) {
            Ok(updated) => updated,
            Err(error) => {
                warn!(
                    event_name = "workflow.action.rejected",
                    correlation_id,
                    request_id = %id.0,
                    action = %action,
                    actor_role = %actor.role,
                    error_class = error.class(),
                    error = %error,
                    "workflow action rejected"
                );
                return Err(error.into());
            }
        };

        if let Err(error) = self.repository.save(&updated, Some(&expected)).await {
            warn!(
                event_name = "workflow.action.persist_failed",
                correlation_id,
                request_id = %id.0,
                expected_version = expected.version,
                error = %error,
                "workflow action could not be saved"
            );
            return Err(error.into());
        }

        info!(
            event_name = "workflow.action.applied",
            correlation_id,
            request_id = %id.0,
            action = %action,
            from = %current.status,
            to = %updated.status,
            version = updated.version,
            "workflow action applied"
        );

        self.dispatch(&updated, correlation_id);
        Ok(updated)
    }

    fn dispatch(&self, request: &Request, correlation_id: &str) {
        let Some(event) = request.last_event() else {
            return;
        };
        let target = match request.current_approver_role {
            Some(role) if request.status.is_in_review() => ActorRole::Reviewer(role),
            _ => ActorRole::Requester,
        };
        let notification = Notification::new(target, request.id.clone(), event.clone());

        if let Err(error) = self.notifier.notify(&notification) {
            warn!(
                event_name = "workflow.notification.failed",
                correlation_id,
                request_id = %request.id.0,
                target = %target,
                error = %error,
                "notification dispatch failed"
            );
        }
    }
}
