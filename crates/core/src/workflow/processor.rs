use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MIN_COMMENT_CHARS;
use crate::domain::event::WorkflowAction;
use crate::domain::request::{Request, RoleApproval};
use crate::domain::role::{Actor, Role};
use crate::domain::status::RequestStatus;
use crate::errors::WorkflowError;
use crate::workflow::gate::{ConfirmationGate, SubmissionQuota, SubmitContext, ValidationResult};
use crate::workflow::policy::DepartmentPolicy;
use crate::workflow::routing::RoutingEngine;
use crate::workflow::state_machine::{
    StatusStateMachine, TransitionContext, TransitionInput, TransitionOutcome,
};
use crate::workflow::suggestion::{suggest_next_approver, Suggestion, SuggestionFlags};

/// Everything an actor sends along with an action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    pub signature: Option<String>,
    pub comments: Option<String>,
    pub reason: Option<String>,
    pub next_approver_role: Option<Role>,
    pub next_approver_id: Option<String>,
}

/// The reviewer's "send to" choice: allowed roles plus a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendToOptions {
    pub allowed: Vec<Role>,
    pub suggestion: Option<Suggestion>,
}

pub struct ApprovalActionProcessor<P> {
    routing: RoutingEngine<P>,
    machine: StatusStateMachine,
    gate: ConfirmationGate,
    min_comment_chars: usize,
}

impl<P> ApprovalActionProcessor<P>
where
    P: DepartmentPolicy,
{
    pub fn new(policy: P) -> Self {
        Self {
            routing: RoutingEngine::new(policy),
            machine: StatusStateMachine,
            gate: ConfirmationGate,
            min_comment_chars: DEFAULT_MIN_COMMENT_CHARS,
        }
    }

    /// Raises the approval comment minimum. Values under the default floor
    /// are ignored.
    pub fn with_min_comment_chars(mut self, min_comment_chars: usize) -> Self {
        self.min_comment_chars = min_comment_chars.max(DEFAULT_MIN_COMMENT_CHARS);
        self
    }

    pub fn routing(&self) -> &RoutingEngine<P> {
        &self.routing
    }

    pub fn can_submit(&self, request: &Request, context: &SubmitContext) -> ValidationResult {
        self.gate.can_submit(request, context)
    }

    pub fn suggest(&self, request: &Request) -> Option<Suggestion> {
        let attributes = self.routing.attributes(request);
        suggest_next_approver(&SuggestionFlags::from_request(request, &attributes))
    }

    pub fn send_to_options(&self, request: &Request) -> SendToOptions {
        let allowed = match request.status {
            RequestStatus::Draft => self.routing.entry_options(request),
            RequestStatus::Returned => self.resubmit_entry(request),
            status => {
                let context = self.context(request, WorkflowAction::Approve);
                self.machine.approval_targets(status, &context)
            }
        };
        let suggestion =
            self.suggest(request).filter(|suggestion| allowed.contains(&suggestion.role));

        SendToOptions { allowed, suggestion }
    }

    pub fn apply(
        &self,
        request: &Request,
        action: WorkflowAction,
        actor: &Actor,
        payload: &ActionPayload,
    ) -> Result<Request, WorkflowError> {
        self.apply_at(request, action, actor, payload, Utc::now())
    }

    /// Validates and applies one action against `request`, returning the
    /// updated copy. On error nothing is changed.
    pub fn apply_at(
        &self,
        request: &Request,
        action: WorkflowAction,
        actor: &Actor,
        payload: &ActionPayload,
        now: DateTime<Utc>,
    ) -> Result<Request, WorkflowError> {
        self.apply_with_quota(request, action, actor, payload, &SubmissionQuota::default(), now)
    }

    /// Like [`Self::apply_at`], with the booking counters a submission is
    /// checked against.
    pub fn apply_with_quota(
        &self,
        request: &Request,
        action: WorkflowAction,
        actor: &Actor,
        payload: &ActionPayload,
        quota: &SubmissionQuota,
        now: DateTime<Utc>,
    ) -> Result<Request, WorkflowError> {
        let at = match request.last_event() {
            Some(last) if last.at > now => last.at,
            _ => now,
        };
        let input = TransitionInput {
            action,
            actor_role: actor.role,
            actor_id: actor.id.clone(),
            signature: payload.signature.clone(),
            comments: payload.comments.clone(),
            reason: payload.reason.clone(),
            next_role: payload.next_approver_role,
            next_approver_id: payload.next_approver_id.clone(),
            at,
        };
        let context = self.context(request, action);

        self.machine.authorize(request.status, &input, &context)?;

        if action == WorkflowAction::Submit {
            self.gate
                .can_submit(
                    request,
                    &SubmitContext {
                        submitter_name: actor.name.clone(),
                        submitter_signature: payload.signature.clone(),
                        today: now.date_naive(),
                        quota: quota.clone(),
                    },
                )
                .into_result()?;
        }

        let outcome = self.machine.transition(request.status, &input, &context)?;
        Ok(self.commit(request, outcome, actor))
    }

    fn context(&self, request: &Request, action: WorkflowAction) -> TransitionContext {
        let entry_roles = match action {
            WorkflowAction::Resubmit => self.resubmit_entry(request),
            _ => self.routing.entry_options(request),
        };
        let allowed_next = match request.status.reviewer_role() {
            Some(role) => self.routing.allowed_next_roles(request, role),
            None => Vec::new(),
        };

        TransitionContext {
            requester_id: request.requester_id.clone(),
            entry_roles,
            allowed_next,
            needs_financial_review: self.routing.needs_financial_review(request),
            vp_requirement: self.routing.vp_requirement(request),
            vp_approved: request.approvals.is_approved(Role::Vp),
            vp2_approved: request.approvals.is_approved(Role::Vp2),
            min_comment_chars: self.min_comment_chars,
        }
    }

    /// Resubmission after a return goes back to the recomputed first
    /// receiver, unless that reviewer's approval survived the return, in
    /// which case the request resumes at the stage that returned it.
    fn resubmit_entry(&self, request: &Request) -> Vec<Role> {
        let first = self.routing.first_receiver(request);
        match request.return_stage {
            Some(stage) if request.approvals.is_approved(first) && stage != first => vec![stage],
            _ => self.routing.entry_options(request),
        }
    }

    fn commit(&self, request: &Request, outcome: TransitionOutcome, actor: &Actor) -> Request {
        let mut updated = request.clone();
        let event = outcome.event;
        let acting = request.status.reviewer_role();

        match event.action {
            WorkflowAction::Submit => {
                if updated.routing.is_none() {
                    updated.routing = Some(self.routing.snapshot(request, event.at));
                }
                updated.submitted_by = Some(actor.id.clone());
                updated.submitter_signature = event.signature_ref.clone();
            }
            WorkflowAction::Approve => {
                if let Some(slot) = outcome.approved_slot {
                    *updated.approvals.get_mut(slot) = RoleApproval {
                        approved_at: Some(event.at),
                        approved_by: Some(actor.id.clone()),
                        signature: event.signature_ref.clone(),
                        comments: event.comments.clone(),
                    };
                }
            }
            WorkflowAction::Reject => {
                updated.rejection_reason = event.comments.clone();
                updated.rejection_stage = acting;
            }
            WorkflowAction::Return => {
                updated.return_reason = event.comments.clone();
                updated.return_stage = acting;
            }
            WorkflowAction::Resubmit if request.status == RequestStatus::Rejected => {
                if let Some(stage) = request.rejection_stage {
                    updated.approvals.clear_from(stage);
                }
                updated.rejection_reason = None;
                updated.rejection_stage = None;
            }
            WorkflowAction::Resubmit => {
                if let Some(stage) = request.return_stage {
                    updated.approvals.clear_from(stage);
                }
                updated.return_reason = None;
                updated.return_stage = None;
                updated.submitter_signature =
                    event.signature_ref.clone().or(updated.submitter_signature);
            }
            WorkflowAction::Receive | WorkflowAction::Forward | WorkflowAction::Cancel => {}
        }

        updated.both_vps_approved =
            updated.approvals.is_approved(Role::Vp) && updated.approvals.is_approved(Role::Vp2);

        if outcome.to.is_in_review() {
            updated.current_approver_role = event.next_approver_role.or(outcome.to.reviewer_role());
            updated.current_approver_id = event.next_approver_id.clone();
        } else {
            updated.current_approver_role = None;
            updated.current_approver_id = None;
        }

        updated.status = outcome.to;
        updated.version += 1;
        updated.updated_at = event.at;
        updated.history.push(event);
        updated
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{ActionPayload, ApprovalActionProcessor};
    use crate::workflow::gate::SubmissionQuota;
    use crate::domain::event::WorkflowAction;
    use crate::domain::request::{
        Request, RequestDetails, RequestId, RequesterRole, TravelOrderDetails, TravelReason,
        VehicleMode,
    };
    use crate::domain::role::{Actor, Role};
    use crate::domain::status::RequestStatus;
    use crate::errors::WorkflowError;
    use crate::workflow::policy::{StaticDepartmentPolicy, VpRequirement};

    fn processor() -> ApprovalActionProcessor<StaticDepartmentPolicy> {
        ApprovalActionProcessor::new(StaticDepartmentPolicy::default())
    }

    fn requester() -> Actor {
        Actor::requester("u-ana", "Ana Cruz")
    }

    fn reviewer(role: Role) -> Actor {
        Actor::reviewer(format!("u-{role}"), role.label(), role)
    }

    fn signed() -> ActionPayload {
        ActionPayload {
            signature: Some("sig://on-file".to_owned()),
            comments: Some("Reviewed, all documents attached.".to_owned()),
            ..ActionPayload::default()
        }
    }

    fn reason(text: &str) -> ActionPayload {
        ActionPayload { reason: Some(text.to_owned()), ..ActionPayload::default() }
    }

    fn travel(mode: VehicleMode, budget: i64) -> Request {
        let mut request = Request::draft(
            RequestId("REQ-30".to_owned()),
            "u-ana",
            "Ana Cruz",
            RequesterRole::Faculty,
            "dept-cs",
            RequestDetails::TravelOrder(TravelOrderDetails {
                requesting_person: "Ana Cruz".to_owned(),
                destination: "Baguio".to_owned(),
                purpose: "Curriculum workshop".to_owned(),
                departure_date: NaiveDate::from_ymd_opt(2030, 6, 1),
                return_date: NaiveDate::from_ymd_opt(2030, 6, 3),
                reason: TravelReason::Official,
                vehicle_mode: mode,
                needs_vehicle: mode != VehicleMode::Owned,
                requesting_person_signature: None,
            }),
        );
        request.head_included = true;
        request.total_budget = Decimal::new(budget, 0);
        if budget > 0 {
            request.budget_justification = Some("Registration and lodging".to_owned());
        }
        request
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).single().expect("valid timestamp")
    }

    fn step(
        processor: &ApprovalActionProcessor<StaticDepartmentPolicy>,
        request: &Request,
        action: WorkflowAction,
        actor: &Actor,
        payload: &ActionPayload,
    ) -> Request {
        let at = now() + Duration::minutes(request.version as i64);
        processor.apply_at(request, action, actor, payload, at).expect("step succeeds")
    }

    fn submit(
        processor: &ApprovalActionProcessor<StaticDepartmentPolicy>,
        request: &Request,
    ) -> Request {
        step(processor, request, WorkflowAction::Submit, &requester(), &signed())
    }

    fn approve(
        processor: &ApprovalActionProcessor<StaticDepartmentPolicy>,
        request: &Request,
        role: Role,
    ) -> Request {
        step(processor, request, WorkflowAction::Approve, &reviewer(role), &signed())
    }

    fn assert_history_matches(request: &Request) {
        assert_eq!(request.history.len() as u64, request.version);
        assert_eq!(request.history.last().map(|event| event.to_status), Some(request.status));
        assert!(request.history.windows(2).all(|pair| pair[0].at <= pair[1].at));
    }

    #[test]
    fn faculty_owned_vehicle_runs_head_then_hr_to_approval() {
        let processor = processor();
        let mut request = travel(VehicleMode::Owned, 0);

        request = submit(&processor, &request);
        assert_eq!(request.status, RequestStatus::PendingHead);

        let mut head = signed();
        head.next_approver_role = Some(Role::Hr);
        request = step(&processor, &request, WorkflowAction::Approve, &reviewer(Role::Head), &head);
        assert_eq!(request.status, RequestStatus::PendingHr);

        request = approve(&processor, &request, Role::Hr);
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.approvals.approved_roles(), vec![Role::Head, Role::Hr]);
        assert_eq!(request.current_approver_role, None);
        assert_history_matches(&request);
    }

    #[test]
    fn institutional_vehicle_with_budget_visits_admin_and_comptroller() {
        let processor = processor();
        let mut request = travel(VehicleMode::Institutional, 5000);

        request = submit(&processor, &request);
        let mut head = signed();
        head.next_approver_role = Some(Role::Admin);
        request = step(&processor, &request, WorkflowAction::Approve, &reviewer(Role::Head), &head);
        let admin = reviewer(Role::Admin);
        let receive = ActionPayload::default();
        request = step(&processor, &request, WorkflowAction::Receive, &admin, &receive);
        assert_eq!(request.status, RequestStatus::AdminReceived);

        request = approve(&processor, &request, Role::Admin);
        assert_eq!(request.status, RequestStatus::PendingComptroller);

        request = approve(&processor, &request, Role::Comptroller);
        assert_eq!(request.status, RequestStatus::PendingHr);
        assert_eq!(
            request.routing.as_ref().map(|snapshot| snapshot.path.clone()),
            Some(vec![Role::Head, Role::Admin, Role::Comptroller, Role::Hr])
        );
        assert_history_matches(&request);
    }

    #[test]
    fn head_requester_skips_head_endorsement() {
        let processor = processor();
        let mut request = travel(VehicleMode::Owned, 0);
        request.requester_role = RequesterRole::Head;

        request = submit(&processor, &request);
        assert_eq!(request.status, RequestStatus::PendingAdmin);

        request = approve(&processor, &request, Role::Admin);
        request = approve(&processor, &request, Role::Hr);

        assert_eq!(request.status, RequestStatus::Approved);
        assert!(!request.approvals.is_approved(Role::Head));
        assert_eq!(request.approvals.head.signature, None);
    }

    #[test]
    fn reject_without_reason_is_validation_error() {
        let processor = processor();
        let request = submit(&processor, &travel(VehicleMode::Owned, 0));

        let error = processor
            .apply_at(&request, WorkflowAction::Reject, &reviewer(Role::Head), &reason(""), now())
            .expect_err("reason is required");

        let WorkflowError::Validation { fields } = error else {
            panic!("expected validation error");
        };
        assert!(fields.contains_key("rejectionReason"));
    }

    #[test]
    fn submit_is_blocked_by_gate_before_any_transition() {
        let processor = processor();
        let request = travel(VehicleMode::Owned, 0);
        let unsigned = ActionPayload::default();

        let error = processor
            .apply_at(&request, WorkflowAction::Submit, &requester(), &unsigned, now())
            .expect_err("signature missing");

        assert!(matches!(
            error,
            WorkflowError::Validation { ref fields } if fields.contains_key("signature")
        ));
        assert_eq!(request.status, RequestStatus::Draft);
        assert!(request.history.is_empty());
    }

    #[test]
    fn unauthorized_actor_is_rejected_before_validation() {
        let processor = processor();
        let request = travel(VehicleMode::Owned, 0);
        let stranger = Actor::requester("u-mallory", "Mallory");

        let error = processor
            .apply_at(&request, WorkflowAction::Submit, &stranger, &ActionPayload::default(), now())
            .expect_err("not the requester");
        assert!(matches!(error, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn return_and_resubmit_preserve_upstream_approvals() {
        let processor = processor();
        let mut request = travel(VehicleMode::Institutional, 1000);

        request = submit(&processor, &request);
        let mut head = signed();
        head.next_approver_role = Some(Role::Admin);
        request = step(&processor, &request, WorkflowAction::Approve, &reviewer(Role::Head), &head);
        request = approve(&processor, &request, Role::Admin);
        request = step(
            &processor,
            &request,
            WorkflowAction::Return,
            &reviewer(Role::Comptroller),
            &reason("Quotation for lodging is missing."),
        );
        assert_eq!(request.status, RequestStatus::Returned);
        assert_eq!(request.return_stage, Some(Role::Comptroller));

        request = step(&processor, &request, WorkflowAction::Resubmit, &requester(), &signed());

        assert_eq!(request.status, RequestStatus::PendingComptroller);
        assert!(request.approvals.is_approved(Role::Head));
        assert!(request.approvals.is_approved(Role::Admin));
        assert_eq!(request.return_reason, None);
        assert_history_matches(&request);
    }

    #[test]
    fn rejection_reopens_as_draft_and_clears_downstream() {
        let processor = processor();
        let mut request = travel(VehicleMode::Owned, 0);
        request = submit(&processor, &request);
        let mut head = signed();
        head.next_approver_role = Some(Role::Hr);
        request = step(&processor, &request, WorkflowAction::Approve, &reviewer(Role::Head), &head);
        request = step(
            &processor,
            &request,
            WorkflowAction::Reject,
            &reviewer(Role::Hr),
            &reason("Travel dates overlap with exams."),
        );
        assert_eq!(request.status, RequestStatus::Rejected);
        assert_eq!(request.rejection_reason.as_deref(), Some("Travel dates overlap with exams."));

        request = step(&processor, &request, WorkflowAction::Resubmit, &requester(), &signed());

        assert_eq!(request.status, RequestStatus::Draft);
        assert_eq!(request.rejection_reason, None);
        assert!(request.approvals.is_approved(Role::Head));
        assert!(request.routing.is_some());
    }

    #[test]
    fn dual_vp_department_needs_both_signatures() {
        let processor = ApprovalActionProcessor::new(
            StaticDepartmentPolicy::new(VpRequirement::None)
                .with_department("dept-cs", VpRequirement::Dual),
        );
        let mut request = travel(VehicleMode::Owned, 0);
        request = submit(&processor, &request);
        let mut head = signed();
        head.next_approver_role = Some(Role::Hr);
        request = step(&processor, &request, WorkflowAction::Approve, &reviewer(Role::Head), &head);
        request = approve(&processor, &request, Role::Hr);
        assert_eq!(request.status, RequestStatus::PendingVp);

        request = approve(&processor, &request, Role::Vp);
        assert_eq!(request.status, RequestStatus::PendingVp);
        assert!(!request.both_vps_approved);
        assert_eq!(request.current_approver_role, Some(Role::Vp2));

        request = approve(&processor, &request, Role::Vp2);
        assert_eq!(request.status, RequestStatus::Approved);
        assert!(request.both_vps_approved);
    }

    #[test]
    fn send_to_options_only_suggest_allowed_roles() {
        let processor = processor();
        let mut request = travel(VehicleMode::Institutional, 2000);
        request = submit(&processor, &request);

        let options = processor.send_to_options(&request);

        assert_eq!(options.allowed, vec![Role::Admin, Role::Comptroller, Role::Hr]);
        let suggested = options.suggestion.map(|suggestion| suggestion.role);
        assert!(suggested.map_or(true, |role| options.allowed.contains(&role)));
    }

    #[test]
    fn failed_action_leaves_request_untouched() {
        let processor = processor();
        let request = submit(&processor, &travel(VehicleMode::Owned, 0));
        let before = request.clone();

        let short = ActionPayload {
            signature: Some("sig://head".to_owned()),
            comments: Some("ok".to_owned()),
            ..ActionPayload::default()
        };
        let error = processor
            .apply_at(&request, WorkflowAction::Approve, &reviewer(Role::Head), &short, now())
            .expect_err("comments too short");

        assert!(matches!(error, WorkflowError::PreconditionUnmet { .. }));
        assert_eq!(request, before);
    }

    #[test]
    fn event_timestamps_never_go_backwards() {
        let processor = processor();
        let request = submit(&processor, &travel(VehicleMode::Owned, 0));

        let earlier = now() - Duration::hours(3);
        let none = ActionPayload::default();
        let cancelled = processor
            .apply_at(&request, WorkflowAction::Cancel, &requester(), &none, earlier)
            .expect("cancel");

        assert_eq!(cancelled.status, RequestStatus::Cancelled);
        assert_history_matches(&cancelled);
    }

    fn assert_every_advertised_role_is_accepted(
        processor: &ApprovalActionProcessor<StaticDepartmentPolicy>,
        request: &Request,
        visited: &mut Vec<RequestStatus>,
    ) {
        let status = request.status;
        let Some(owner) = status.reviewer_role() else {
            return;
        };
        if !visited.contains(&status) {
            visited.push(status);
        }
        let action = match status {
            RequestStatus::HeadApproved => WorkflowAction::Forward,
            _ => WorkflowAction::Approve,
        };

        for role in processor.send_to_options(request).allowed {
            let mut payload = signed();
            payload.next_approver_role = Some(role);
            let at = now() + Duration::minutes(request.version as i64);
            let next = processor
                .apply_at(request, action, &reviewer(owner), &payload, at)
                .unwrap_or_else(|error| panic!("{status:?} refused advertised {role:?}: {error}"));
            assert_eq!(next.current_approver_role, Some(role));
            assert_every_advertised_role_is_accepted(processor, &next, visited);
        }

        match status {
            RequestStatus::PendingHead => {
                let endorsed = approve(processor, request, Role::Head);
                assert_every_advertised_role_is_accepted(processor, &endorsed, visited);
            }
            RequestStatus::PendingAdmin => {
                let received = step(
                    processor,
                    request,
                    WorkflowAction::Receive,
                    &reviewer(Role::Admin),
                    &ActionPayload::default(),
                );
                assert_every_advertised_role_is_accepted(processor, &received, visited);
            }
            _ => {}
        }
    }

    #[test]
    fn every_advertised_send_to_role_is_accepted() {
        let processor = ApprovalActionProcessor::new(
            StaticDepartmentPolicy::new(VpRequirement::None)
                .with_department("dept-cs", VpRequirement::Dual),
        );
        let mut visited = Vec::new();

        let mut institutional = travel(VehicleMode::Institutional, 2000);
        institutional.parent_department_id = Some("dept-eng".to_owned());
        for request in [institutional, travel(VehicleMode::Owned, 0)] {
            let submitted = submit(&processor, &request);
            assert_every_advertised_role_is_accepted(&processor, &submitted, &mut visited);
        }

        for status in [
            RequestStatus::PendingHead,
            RequestStatus::HeadApproved,
            RequestStatus::PendingParentHead,
            RequestStatus::PendingAdmin,
            RequestStatus::AdminReceived,
            RequestStatus::PendingComptroller,
            RequestStatus::PendingHr,
            RequestStatus::PendingVp,
        ] {
            assert!(visited.contains(&status), "{status:?} was never reached");
        }
    }

    #[test]
    fn fixed_step_offers_only_its_single_target() {
        let processor = processor();
        let mut request = submit(&processor, &travel(VehicleMode::Institutional, 2000));
        let mut head = signed();
        head.next_approver_role = Some(Role::Admin);
        request = step(&processor, &request, WorkflowAction::Approve, &reviewer(Role::Head), &head);
        assert_eq!(request.status, RequestStatus::PendingAdmin);

        let options = processor.send_to_options(&request);

        assert_eq!(options.allowed, vec![Role::Comptroller]);
        assert_eq!(options.suggestion, None);
    }

    #[test]
    fn comment_minimum_never_drops_below_ten_characters() {
        let processor = processor().with_min_comment_chars(3);
        let request = submit(&processor, &travel(VehicleMode::Owned, 0));
        let brief = ActionPayload {
            signature: Some("sig://head".to_owned()),
            comments: Some("okay".to_owned()),
            ..ActionPayload::default()
        };

        let error = processor
            .apply_at(&request, WorkflowAction::Approve, &reviewer(Role::Head), &brief, now())
            .expect_err("four characters are below the floor");

        assert!(matches!(
            error,
            WorkflowError::PreconditionUnmet { ref fields } if fields.contains_key("comments")
        ));
    }

    #[test]
    fn return_before_any_approval_resubmits_to_first_receiver() {
        let processor = processor();
        let mut request = submit(&processor, &travel(VehicleMode::Owned, 0));
        request = step(
            &processor,
            &request,
            WorkflowAction::Return,
            &reviewer(Role::Head),
            &reason("Attach the invitation letter."),
        );
        assert_eq!(request.return_stage, Some(Role::Head));

        request = step(&processor, &request, WorkflowAction::Resubmit, &requester(), &signed());

        assert_eq!(request.status, RequestStatus::PendingHead);
        assert_eq!(request.current_approver_role, Some(Role::Head));
        assert_eq!(request.return_stage, None);
        assert_history_matches(&request);
    }

    #[test]
    fn zero_budget_institutional_vehicle_goes_through_comptroller() {
        let processor = processor();
        let mut request = submit(&processor, &travel(VehicleMode::Institutional, 0));
        assert_eq!(
            processor.routing().full_approval_path(&request),
            vec![Role::Head, Role::Admin, Role::Comptroller, Role::Hr]
        );

        let mut head = signed();
        head.next_approver_role = Some(Role::Admin);
        request = step(&processor, &request, WorkflowAction::Approve, &reviewer(Role::Head), &head);
        request = approve(&processor, &request, Role::Admin);

        assert_eq!(request.status, RequestStatus::PendingComptroller);
        assert_eq!(
            processor.suggest(&request).map(|suggestion| suggestion.role),
            Some(Role::Comptroller)
        );
    }

    #[test]
    fn submission_respects_daily_vehicle_limit() {
        let processor = processor();
        let request = travel(VehicleMode::Institutional, 0);
        let quota = SubmissionQuota { vehicle_requests_that_day: 5, ..SubmissionQuota::default() };

        let error = processor
            .apply_with_quota(
                &request,
                WorkflowAction::Submit,
                &requester(),
                &signed(),
                &quota,
                now(),
            )
            .expect_err("vehicles are fully booked");

        assert!(matches!(
            error,
            WorkflowError::Validation { ref fields } if fields.contains_key("needsVehicle")
        ));
    }
}
