use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::role::{ActorRole, Role};
use crate::domain::status::RequestStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Submit,
    Approve,
    Reject,
    Return,
    Resubmit,
    Receive,
    Forward,
    Cancel,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Return => "return",
            Self::Resubmit => "resubmit",
            Self::Receive => "receive",
            Self::Forward => "forward",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "submit" => Some(Self::Submit),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "return" => Some(Self::Return),
            "resubmit" => Some(Self::Resubmit),
            "receive" => Some(Self::Receive),
            "forward" => Some(Self::Forward),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a request's append-only history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub action: WorkflowAction,
    pub actor_role: ActorRole,
    pub actor_id: String,
    pub at: DateTime<Utc>,
    pub signature_ref: Option<String>,
    pub comments: Option<String>,
    pub from_status: RequestStatus,
    pub to_status: RequestStatus,
    pub next_approver_role: Option<Role>,
    pub next_approver_id: Option<String>,
}
