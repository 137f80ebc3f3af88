use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::event::ApprovalEvent;
use crate::domain::request::RequestId;
use crate::domain::role::ActorRole;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub target: ActorRole,
    pub target_id: Option<String>,
    pub request_id: RequestId,
    pub event: ApprovalEvent,
    pub queued_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(target: ActorRole, request_id: RequestId, event: ApprovalEvent) -> Self {
        let target_id = event.next_approver_id.clone();
        Self { target, target_id, request_id, event, queued_at: Utc::now() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("delivery to {target} failed: {reason}")]
    Delivery { target: ActorRole, reason: String },
}

/// Fire-and-forget delivery. Callers log failures and carry on.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationDispatcher {
    sent: Arc<Mutex<Vec<Notification>>>,
    failure: Option<String>,
}

impl InMemoryNotificationDispatcher {
    /// A dispatcher that rejects every delivery with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { sent: Arc::default(), failure: Some(message.into()) }
    }

    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationDispatcher for InMemoryNotificationDispatcher {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Some(reason) = &self.failure {
            return Err(NotifyError::Delivery {
                target: notification.target,
                reason: reason.clone(),
            });
        }
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}

/// Emits each notification as a structured log line.
#[derive(Clone, Debug, Default)]
pub struct TracingNotificationDispatcher;

impl NotificationDispatcher for TracingNotificationDispatcher {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            event_name = "workflow.notification.sent",
            request_id = %notification.request_id.0,
            target = %notification.target,
            target_id = notification.target_id.as_deref().unwrap_or("-"),
            action = %notification.event.action,
            to_status = %notification.event.to_status,
            "notification dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::event::{ApprovalEvent, WorkflowAction};
    use crate::domain::request::RequestId;
    use crate::domain::role::{ActorRole, Role};
    use crate::domain::status::RequestStatus;
    use crate::notify::{
        InMemoryNotificationDispatcher, Notification, NotificationDispatcher, NotifyError,
    };

    fn submitted() -> ApprovalEvent {
        ApprovalEvent {
            action: WorkflowAction::Submit,
            actor_role: ActorRole::Requester,
            actor_id: "u-faculty".to_owned(),
            at: Utc::now(),
            signature_ref: Some("sig://faculty".to_owned()),
            comments: None,
            from_status: RequestStatus::Draft,
            to_status: RequestStatus::PendingHead,
            next_approver_role: Some(Role::Head),
            next_approver_id: Some("u-head".to_owned()),
        }
    }

    #[test]
    fn in_memory_dispatcher_records_target_and_event() {
        let dispatcher = InMemoryNotificationDispatcher::default();
        let notification = Notification::new(
            ActorRole::Reviewer(Role::Head),
            RequestId("REQ-7".to_owned()),
            submitted(),
        );

        dispatcher.notify(&notification).expect("delivery succeeds");

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, ActorRole::Reviewer(Role::Head));
        assert_eq!(sent[0].target_id.as_deref(), Some("u-head"));
        assert_eq!(sent[0].event.to_status, RequestStatus::PendingHead);
    }

    #[test]
    fn failing_dispatcher_reports_error_without_recording() {
        let dispatcher = InMemoryNotificationDispatcher::failing("smtp unreachable");
        let notification =
            Notification::new(ActorRole::Requester, RequestId("REQ-8".to_owned()), submitted());

        let error = dispatcher.notify(&notification).expect_err("delivery fails");
        assert_eq!(
            error,
            NotifyError::Delivery {
                target: ActorRole::Requester,
                reason: "smtp unreachable".to_owned(),
            }
        );
        assert_eq!(error.to_string(), "delivery to requester failed: smtp unreachable");
        assert!(dispatcher.sent().is_empty());
    }
}
