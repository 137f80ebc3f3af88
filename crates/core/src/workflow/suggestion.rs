use serde::{Deserialize, Serialize};

use crate::domain::request::{Request, RequesterRole, VehicleMode};
use crate::domain::role::Role;
use crate::workflow::policy::VpRequirement;
use crate::workflow::routing::RoutingAttributes;

/// History-derived flags the suggestion heuristic reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionFlags {
    pub requester_is_head: bool,
    pub requester_is_comptroller: bool,
    pub head_included: bool,
    pub has_budget: bool,
    /// A non-owned vehicle goes through financial review even without a budget.
    pub vehicle_review: bool,
    pub parent_head_approved: bool,
    pub admin_approved: bool,
    pub comptroller_approved: bool,
    pub hr_approved: bool,
    pub vp_approved: bool,
    pub both_vps_approved: bool,
    pub vp_requirement: VpRequirement,
}

impl SuggestionFlags {
    pub fn from_request(request: &Request, attributes: &RoutingAttributes) -> Self {
        let approvals = &request.approvals;
        Self {
            requester_is_head: request.requester_role == RequesterRole::Head,
            requester_is_comptroller: request.requester_is_comptroller,
            head_included: request.head_included,
            has_budget: attributes.has_budget,
            vehicle_review: attributes.vehicle_mode != VehicleMode::Owned,
            parent_head_approved: approvals.is_approved(Role::ParentHead),
            admin_approved: approvals.is_approved(Role::Admin),
            comptroller_approved: approvals.is_approved(Role::Comptroller),
            hr_approved: approvals.is_approved(Role::Hr),
            vp_approved: approvals.is_approved(Role::Vp),
            both_vps_approved: request.both_vps_approved,
            vp_requirement: attributes.vp_requirement,
        }
    }

    fn needs_financial_review(&self) -> bool {
        self.has_budget || self.vehicle_review
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub role: Role,
    pub label: String,
    pub reason: String,
}

impl Suggestion {
    fn new(role: Role, reason: &str) -> Self {
        Self { role, label: role.label().to_string(), reason: reason.to_string() }
    }
}

/// Best-guess next approver. First matching rule wins; `None` means the
/// caller has to pick manually.
pub fn suggest_next_approver(flags: &SuggestionFlags) -> Option<Suggestion> {
    if flags.parent_head_approved && !flags.admin_approved {
        return Some(Suggestion::new(
            Role::Admin,
            "Parent head already signed; route to admin for processing.",
        ));
    }

    if flags.requester_is_head && !flags.head_included && !flags.admin_approved {
        return Some(Suggestion::new(
            Role::Admin,
            "Requester is a department head; no department endorsement needed.",
        ));
    }

    if flags.admin_approved
        && flags.needs_financial_review()
        && !flags.comptroller_approved
        && !flags.requester_is_comptroller
    {
        let reason = if flags.has_budget {
            "Budget present; requires financial review."
        } else {
            "Institutional or rented vehicle; requires financial review."
        };
        return Some(Suggestion::new(Role::Comptroller, reason));
    }

    let financial_review_done = flags.comptroller_approved
        || !flags.needs_financial_review()
        || flags.requester_is_comptroller;
    if financial_review_done && !flags.hr_approved {
        let reason = if flags.requester_is_comptroller && !flags.comptroller_approved {
            "Requester is the comptroller; continue to HR."
        } else if flags.needs_financial_review() {
            "Financial review done by the comptroller; HR approval is next."
        } else {
            "No budget to review; HR approval is next."
        };
        return Some(Suggestion::new(Role::Hr, reason));
    }

    if flags.vp_requirement.requires_vp() {
        if !flags.vp_approved {
            return Some(Suggestion::new(Role::Vp, "Department policy requires VP sign-off."));
        }
        if flags.vp_requirement.requires_both() && !flags.both_vps_approved {
            return Some(Suggestion::new(
                Role::Vp2,
                "Department policy requires both VPs; the second VP has not signed.",
            ));
        }
    }

    None
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverCandidate {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// First candidate holding the suggested role.
pub fn match_suggested_approver<'a>(
    suggestion: Option<&Suggestion>,
    candidates: &'a [ApproverCandidate],
) -> Option<&'a ApproverCandidate> {
    let suggestion = suggestion?;
    candidates.iter().find(|candidate| candidate.role == suggestion.role)
}
