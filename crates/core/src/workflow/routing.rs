use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{
    Request, RequestKind, RequesterRole, RoutingSnapshot, TravelReason, VehicleMode,
};
use crate::domain::role::Role;
use crate::domain::status::RequestStatus;
use crate::workflow::policy::{DepartmentPolicy, VpRequirement};

/// The static request attributes routing depends on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingAttributes {
    pub kind: RequestKind,
    pub requester_role: RequesterRole,
    pub vehicle_mode: VehicleMode,
    pub reason: Option<TravelReason>,
    pub has_budget: bool,
    pub needs_vehicle: bool,
    pub vp_requirement: VpRequirement,
}

pub fn needs_financial_review(has_budget: bool, vehicle_mode: VehicleMode) -> bool {
    has_budget || vehicle_mode != VehicleMode::Owned
}

pub fn first_receiver(attributes: &RoutingAttributes) -> Role {
    if attributes.kind == RequestKind::Maintenance {
        return Role::Admin;
    }
    if attributes.reason == Some(TravelReason::Seminar) {
        return match attributes.requester_role {
            RequesterRole::Head => Role::Admin,
            RequesterRole::Faculty => Role::Head,
        };
    }
    match attributes.requester_role {
        RequesterRole::Head => Role::Admin,
        RequesterRole::Faculty => Role::Head,
    }
}

pub fn full_approval_path(attributes: &RoutingAttributes) -> Vec<Role> {
    let entry = first_receiver(attributes);
    let mut path = Vec::with_capacity(6);

    if entry == Role::Head {
        path.push(Role::Head);
    }
    if entry == Role::Admin
        || attributes.needs_vehicle
        || attributes.vehicle_mode != VehicleMode::Owned
    {
        path.push(Role::Admin);
    }
    if needs_financial_review(attributes.has_budget, attributes.vehicle_mode) {
        path.push(Role::Comptroller);
    }
    path.push(Role::Hr);
    match attributes.vp_requirement {
        VpRequirement::None => {}
        VpRequirement::Single => path.push(Role::Vp),
        VpRequirement::Dual => path.extend([Role::Vp, Role::Vp2]),
    }

    path
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowProgress {
    pub status_label: String,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

/// Routing decisions for requests, parameterized by the department policy
/// that decides VP sign-off.
pub struct RoutingEngine<P> {
    policy: P,
}

impl<P> RoutingEngine<P>
where
    P: DepartmentPolicy,
{
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn vp_requirement(&self, request: &Request) -> VpRequirement {
        self.policy.vp_requirement(&request.department_id)
    }

    /// Budget presence and vehicle mode come from the routing snapshot once
    /// the request has been submitted, so later edits never shift the path.
    pub fn attributes(&self, request: &Request) -> RoutingAttributes {
        let (has_budget, vehicle_mode) = match &request.routing {
            Some(snapshot) => (snapshot.has_budget, snapshot.vehicle_mode),
            None => (request.has_budget(), request.vehicle_mode()),
        };

        RoutingAttributes {
            kind: request.kind(),
            requester_role: request.requester_role,
            vehicle_mode,
            reason: request.reason(),
            has_budget,
            needs_vehicle: request.needs_vehicle(),
            vp_requirement: self.vp_requirement(request),
        }
    }

    pub fn first_receiver(&self, request: &Request) -> Role {
        first_receiver(&self.attributes(request))
    }

    pub fn full_approval_path(&self, request: &Request) -> Vec<Role> {
        full_approval_path(&self.attributes(request))
    }

    pub fn needs_financial_review(&self, request: &Request) -> bool {
        let attributes = self.attributes(request);
        needs_financial_review(attributes.has_budget, attributes.vehicle_mode)
    }

    /// Roles a requester may address at submission, default first. A head
    /// requester whose department has a parent may go to the parent head
    /// instead of admin.
    pub fn entry_options(&self, request: &Request) -> Vec<Role> {
        let mut options = vec![self.first_receiver(request)];
        if request.requester_role == RequesterRole::Head
            && request.parent_department_id.is_some()
            && request.kind() != RequestKind::Maintenance
        {
            options.push(Role::ParentHead);
        }
        options
    }

    /// The discretionary "send to" set from `from`: roles downstream of it on
    /// the computed path that have not signed yet, plus the parent head when
    /// a head is forwarding inside a department hierarchy.
    pub fn allowed_next_roles(&self, request: &Request, from: Role) -> Vec<Role> {
        let mut allowed: Vec<Role> = self
            .full_approval_path(request)
            .into_iter()
            .filter(|role| *role > from && *role != Role::Vp2)
            .filter(|role| !request.approvals.is_approved(*role))
            .collect();

        if from == Role::Head
            && request.parent_department_id.is_some()
            && !request.approvals.is_approved(Role::ParentHead)
        {
            allowed.push(Role::ParentHead);
        }

        allowed.sort();
        allowed.dedup();
        allowed
    }

    pub fn snapshot(&self, request: &Request, submitted_at: DateTime<Utc>) -> RoutingSnapshot {
        let attributes = self.attributes(request);
        RoutingSnapshot {
            first_receiver: first_receiver(&attributes),
            path: full_approval_path(&attributes),
            has_budget: attributes.has_budget,
            vehicle_mode: attributes.vehicle_mode,
            submitted_at,
        }
    }

    pub fn progress(&self, request: &Request) -> WorkflowProgress {
        let path = self.full_approval_path(request);
        let total = path.len();
        let completed = path.iter().filter(|role| request.approvals.is_approved(**role)).count();
        let percent = match request.status {
            RequestStatus::Approved => 100,
            RequestStatus::Draft => 0,
            _ if total == 0 => 0,
            _ => ((completed * 100) / total).min(99) as u8,
        };

        WorkflowProgress {
            status_label: request.status.label().to_string(),
            completed,
            total,
            percent,
        }
    }
}
