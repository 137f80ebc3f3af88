use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::role::{ActorRole, Role};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    PendingHead,
    HeadApproved,
    PendingParentHead,
    PendingAdmin,
    AdminReceived,
    PendingComptroller,
    PendingHr,
    PendingVp,
    Approved,
    Rejected,
    Returned,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingHead => "pending_head",
            Self::HeadApproved => "head_approved",
            Self::PendingParentHead => "pending_parent_head",
            Self::PendingAdmin => "pending_admin",
            Self::AdminReceived => "admin_received",
            Self::PendingComptroller => "pending_comptroller",
            Self::PendingHr => "pending_hr",
            Self::PendingVp => "pending_vp",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending_head" => Some(Self::PendingHead),
            "head_approved" => Some(Self::HeadApproved),
            "pending_parent_head" => Some(Self::PendingParentHead),
            "pending_admin" => Some(Self::PendingAdmin),
            "admin_received" => Some(Self::AdminReceived),
            "pending_comptroller" => Some(Self::PendingComptroller),
            "pending_hr" => Some(Self::PendingHr),
            "pending_vp" => Some(Self::PendingVp),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "returned" => Some(Self::Returned),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::PendingHead => "Pending Head Approval",
            Self::HeadApproved => "Approved by Head, Awaiting Routing",
            Self::PendingParentHead => "Pending Parent Department Head",
            Self::PendingAdmin => "Pending Admin Processing",
            Self::AdminReceived => "Received by Admin",
            Self::PendingComptroller => "Pending Comptroller Review",
            Self::PendingHr => "Pending HR Approval",
            Self::PendingVp => "Pending VP Approval",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Returned => "Returned to Requester",
            Self::Cancelled => "Cancelled",
        }
    }

    /// The status a request enters when it is addressed to `role`.
    pub fn pending_for(role: Role) -> Self {
        match role {
            Role::Head => Self::PendingHead,
            Role::ParentHead => Self::PendingParentHead,
            Role::Admin => Self::PendingAdmin,
            Role::Comptroller => Self::PendingComptroller,
            Role::Hr => Self::PendingHr,
            Role::Vp | Role::Vp2 => Self::PendingVp,
        }
    }

    /// Reviewer role that owns the request while it sits in this status.
    /// `pending_vp` reports `vp`; the second VP slot is resolved by the
    /// state machine.
    pub fn reviewer_role(&self) -> Option<Role> {
        match self {
            Self::PendingHead | Self::HeadApproved => Some(Role::Head),
            Self::PendingParentHead => Some(Role::ParentHead),
            Self::PendingAdmin | Self::AdminReceived => Some(Role::Admin),
            Self::PendingComptroller => Some(Role::Comptroller),
            Self::PendingHr => Some(Role::Hr),
            Self::PendingVp => Some(Role::Vp),
            _ => None,
        }
    }

    pub fn gating_actor(&self) -> Option<ActorRole> {
        match self {
            Self::Draft | Self::Returned | Self::Rejected => Some(ActorRole::Requester),
            other => other.reviewer_role().map(ActorRole::Reviewer),
        }
    }

    pub fn is_in_review(&self) -> bool {
        self.reviewer_role().is_some()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
