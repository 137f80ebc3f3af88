use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::event::ApprovalEvent;
use crate::domain::role::Role;
use crate::domain::status::RequestStatus;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("REQ-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    TravelOrder,
    Seminar,
    Maintenance,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TravelOrder => "travel_order",
            Self::Seminar => "seminar",
            Self::Maintenance => "maintenance",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterRole {
    Faculty,
    Head,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleMode {
    Owned,
    Institutional,
    Rent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelReason {
    Seminar,
    Educational,
    Competition,
    Visit,
    Official,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Confirmed,
    Declined,
}

/// A co-requester or seminar participant. `invited_at` is `None` until an
/// invitation has actually been sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: String,
    pub name: String,
    pub department: String,
    pub invitation_status: InvitationStatus,
    pub invited_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn was_invited(&self) -> bool {
        self.invited_at.is_some() || self.invitation_status != InvitationStatus::Pending
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadEndorsement {
    pub department: String,
    pub head_id: Option<String>,
    pub status: InvitationStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelOrderDetails {
    pub requesting_person: String,
    pub destination: String,
    pub purpose: String,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub reason: TravelReason,
    pub vehicle_mode: VehicleMode,
    #[serde(default)]
    pub needs_vehicle: bool,
    pub requesting_person_signature: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeminarDetails {
    pub title: String,
    pub venue: String,
    pub purpose: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub participants: Vec<Invitation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceDetails {
    pub vehicle_id: String,
    pub description: String,
    pub scheduled_date: Option<NaiveDate>,
}

/// Kind-specific payload. Each kind has its own routing profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestDetails {
    TravelOrder(TravelOrderDetails),
    Seminar(SeminarDetails),
    Maintenance(MaintenanceDetails),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleApproval {
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub signature: Option<String>,
    pub comments: Option<String>,
}

impl RoleApproval {
    pub fn is_approved(&self) -> bool {
        self.approved_at.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleApprovals {
    #[serde(default)]
    pub head: RoleApproval,
    #[serde(default)]
    pub parent_head: RoleApproval,
    #[serde(default)]
    pub admin: RoleApproval,
    #[serde(default)]
    pub comptroller: RoleApproval,
    #[serde(default)]
    pub hr: RoleApproval,
    #[serde(default)]
    pub vp: RoleApproval,
    #[serde(default)]
    pub vp2: RoleApproval,
}

impl RoleApprovals {
    pub fn get(&self, role: Role) -> &RoleApproval {
        match role {
            Role::Head => &self.head,
            Role::ParentHead => &self.parent_head,
            Role::Admin => &self.admin,
            Role::Comptroller => &self.comptroller,
            Role::Hr => &self.hr,
            Role::Vp => &self.vp,
            Role::Vp2 => &self.vp2,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut RoleApproval {
        match role {
            Role::Head => &mut self.head,
            Role::ParentHead => &mut self.parent_head,
            Role::Admin => &mut self.admin,
            Role::Comptroller => &mut self.comptroller,
            Role::Hr => &mut self.hr,
            Role::Vp => &mut self.vp,
            Role::Vp2 => &mut self.vp2,
        }
    }

    pub fn is_approved(&self, role: Role) -> bool {
        self.get(role).is_approved()
    }

    pub fn approved_roles(&self) -> Vec<Role> {
        Role::ALL.into_iter().filter(|role| self.is_approved(*role)).collect()
    }

    /// Clears every slot at or after `stage` in canonical order.
    pub fn clear_from(&mut self, stage: Role) {
        for role in Role::ALL.into_iter().filter(|role| *role >= stage) {
            *self.get_mut(role) = RoleApproval::default();
        }
    }
}

/// Routing facts frozen at first submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSnapshot {
    pub first_receiver: Role,
    pub path: Vec<Role>,
    pub has_budget: bool,
    pub vehicle_mode: VehicleMode,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    #[serde(default)]
    pub version: u64,
    pub status: RequestStatus,
    pub requester_id: String,
    pub requester_name: String,
    pub requester_role: RequesterRole,
    #[serde(default)]
    pub requester_is_comptroller: bool,
    /// A department head takes part in the request (as co-requester or
    /// endorser) even though the requester is not that head.
    #[serde(default)]
    pub head_included: bool,
    pub department_id: String,
    pub parent_department_id: Option<String>,
    #[serde(default)]
    pub total_budget: Decimal,
    pub budget_justification: Option<String>,
    pub details: RequestDetails,
    #[serde(default)]
    pub co_requesters: Vec<Invitation>,
    #[serde(default)]
    pub head_endorsements: Vec<HeadEndorsement>,
    #[serde(default)]
    pub approvals: RoleApprovals,
    #[serde(default)]
    pub both_vps_approved: bool,
    pub routing: Option<RoutingSnapshot>,
    pub current_approver_role: Option<Role>,
    pub current_approver_id: Option<String>,
    pub submitted_by: Option<String>,
    pub submitter_signature: Option<String>,
    pub rejection_reason: Option<String>,
    pub rejection_stage: Option<Role>,
    pub return_reason: Option<String>,
    pub return_stage: Option<Role>,
    #[serde(default)]
    pub history: Vec<ApprovalEvent>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Request {
    pub fn draft(
        id: RequestId,
        requester_id: impl Into<String>,
        requester_name: impl Into<String>,
        requester_role: RequesterRole,
        department_id: impl Into<String>,
        details: RequestDetails,
    ) -> Self {
        let now = Utc::now();
        let mut details = details;
        if let RequestDetails::TravelOrder(travel) = &mut details {
            if let Some(locked) = lock_vehicle(travel.reason) {
                travel.vehicle_mode = locked;
            }
        }

        Self {
            id,
            version: 0,
            status: RequestStatus::Draft,
            requester_id: requester_id.into(),
            requester_name: requester_name.into(),
            requester_role,
            requester_is_comptroller: false,
            head_included: false,
            department_id: department_id.into(),
            parent_department_id: None,
            total_budget: Decimal::ZERO,
            budget_justification: None,
            details,
            co_requesters: Vec::new(),
            head_endorsements: Vec::new(),
            approvals: RoleApprovals::default(),
            both_vps_approved: false,
            routing: None,
            current_approver_role: None,
            current_approver_id: None,
            submitted_by: None,
            submitter_signature: None,
            rejection_reason: None,
            rejection_stage: None,
            return_reason: None,
            return_stage: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self.details {
            RequestDetails::TravelOrder(_) => RequestKind::TravelOrder,
            RequestDetails::Seminar(_) => RequestKind::Seminar,
            RequestDetails::Maintenance(_) => RequestKind::Maintenance,
        }
    }

    /// Travel orders carry their own mode; other kinds never book a vehicle.
    pub fn vehicle_mode(&self) -> VehicleMode {
        match &self.details {
            RequestDetails::TravelOrder(travel) => travel.vehicle_mode,
            _ => VehicleMode::Owned,
        }
    }

    pub fn reason(&self) -> Option<TravelReason> {
        match &self.details {
            RequestDetails::TravelOrder(travel) => Some(travel.reason),
            RequestDetails::Seminar(_) => Some(TravelReason::Seminar),
            RequestDetails::Maintenance(_) => None,
        }
    }

    pub fn needs_vehicle(&self) -> bool {
        match &self.details {
            RequestDetails::TravelOrder(travel) => travel.needs_vehicle,
            _ => false,
        }
    }

    pub fn has_budget(&self) -> bool {
        self.total_budget > Decimal::ZERO
    }

    pub fn participants(&self) -> &[Invitation] {
        match &self.details {
            RequestDetails::Seminar(seminar) => &seminar.participants,
            _ => &[],
        }
    }

    pub fn has_been_submitted(&self) -> bool {
        self.routing.is_some()
    }

    pub fn last_event(&self) -> Option<&ApprovalEvent> {
        self.history.last()
    }

    pub fn set_vehicle_mode(&mut self, mode: VehicleMode) -> Result<(), DomainError> {
        if self.has_been_submitted() {
            return Err(DomainError::VehicleModeFrozen);
        }
        let RequestDetails::TravelOrder(travel) = &mut self.details else {
            return Err(DomainError::InvariantViolation(
                "vehicle mode only applies to travel orders".to_string(),
            ));
        };
        if let Some(locked) = lock_vehicle(travel.reason) {
            if locked != mode {
                return Err(DomainError::VehicleModeLocked { reason: travel.reason, mode: locked });
            }
        }
        travel.vehicle_mode = mode;
        Ok(())
    }

    /// The budget may be edited by reviewers at any time; routing keeps the
    /// value frozen in [`RoutingSnapshot`].
    pub fn set_total_budget(&mut self, amount: Decimal) -> Result<(), DomainError> {
        if amount < Decimal::ZERO {
            return Err(DomainError::NegativeBudget(amount));
        }
        self.total_budget = amount;
        Ok(())
    }

    pub fn add_co_requester(&mut self, invitation: Invitation) -> Result<(), DomainError> {
        if invitations_frozen(&self.co_requesters) {
            return Err(DomainError::InvitationsFrozen { list: "coRequesters" });
        }
        self.co_requesters.push(invitation);
        Ok(())
    }

    pub fn remove_co_requester(&mut self, id: &str) -> Result<(), DomainError> {
        if invitations_frozen(&self.co_requesters) {
            return Err(DomainError::InvitationsFrozen { list: "coRequesters" });
        }
        self.co_requesters.retain(|entry| entry.id != id);
        Ok(())
    }

    pub fn add_participant(&mut self, invitation: Invitation) -> Result<(), DomainError> {
        let RequestDetails::Seminar(seminar) = &mut self.details else {
            return Err(DomainError::InvariantViolation(
                "participants only apply to seminar requests".to_string(),
            ));
        };
        if invitations_frozen(&seminar.participants) {
            return Err(DomainError::InvitationsFrozen { list: "participants" });
        }
        seminar.participants.push(invitation);
        Ok(())
    }
}

/// Reasons that force the institutional vehicle.
pub fn lock_vehicle(reason: TravelReason) -> Option<VehicleMode> {
    match reason {
        TravelReason::Educational | TravelReason::Competition => Some(VehicleMode::Institutional),
        _ => None,
    }
}

fn invitations_frozen(entries: &[Invitation]) -> bool {
    entries.iter().any(|entry| entry.invitation_status != InvitationStatus::Pending)
}
