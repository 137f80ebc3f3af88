use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::event::{ApprovalEvent, WorkflowAction};
use crate::domain::role::{ActorRole, Role};
use crate::domain::status::RequestStatus;
use crate::errors::{field_error, FieldErrors, WorkflowError};
use crate::workflow::policy::VpRequirement;

/// One attempted action, as submitted by an actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionInput {
    pub action: WorkflowAction,
    pub actor_role: ActorRole,
    pub actor_id: String,
    pub signature: Option<String>,
    pub comments: Option<String>,
    pub reason: Option<String>,
    pub next_role: Option<Role>,
    pub next_approver_id: Option<String>,
    pub at: DateTime<Utc>,
}

/// Facts about the request the transition table needs but cannot compute
/// itself. Built by the processor from the request and routing engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionContext {
    pub requester_id: String,
    /// Roles a submit/resubmit may address; the first one is the default.
    pub entry_roles: Vec<Role>,
    /// Discretionary "send to" set for the acting reviewer.
    pub allowed_next: Vec<Role>,
    pub needs_financial_review: bool,
    pub vp_requirement: VpRequirement,
    pub vp_approved: bool,
    pub vp2_approved: bool,
    pub min_comment_chars: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub event: ApprovalEvent,
    /// Approval slot the actor's signature fills, for approve actions.
    pub approved_slot: Option<Role>,
}

/// Pure transition table keyed by `(status, action, actor role)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusStateMachine;

impl StatusStateMachine {
    pub fn initial_status(&self) -> RequestStatus {
        RequestStatus::Draft
    }

    /// Checks that `input`'s actor is the one gating `(current, action)`.
    /// Returns the reviewer role acting, or `None` for the requester.
    pub fn authorize(
        &self,
        current: RequestStatus,
        input: &TransitionInput,
        context: &TransitionContext,
    ) -> Result<Option<Role>, WorkflowError> {
        use RequestStatus::{Draft, Rejected, Returned};
        use WorkflowAction::{Approve, Cancel, Forward, Receive, Reject, Resubmit, Return, Submit};

        match input.action {
            Submit | Resubmit | Cancel => {
                let legal = match input.action {
                    Submit => current == Draft,
                    Resubmit => matches!(current, Returned | Rejected),
                    _ => current == Draft || current == Returned || current.is_in_review(),
                };
                if !legal {
                    return Err(invalid(current, input, "action is not available in this status"));
                }
                let is_requester = input.actor_role == ActorRole::Requester
                    && input.actor_id == context.requester_id;
                if !is_requester {
                    return Err(invalid(current, input, "only the requester may do this"));
                }
                Ok(None)
            }
            Approve | Reject | Return | Receive | Forward => {
                let legal = match input.action {
                    Approve => current.is_in_review() && current != RequestStatus::HeadApproved,
                    Receive => current == RequestStatus::PendingAdmin,
                    Forward => current == RequestStatus::HeadApproved,
                    _ => current.is_in_review(),
                };
                if !legal {
                    return Err(invalid(current, input, "action is not available in this status"));
                }
                let Some(expected) = current.reviewer_role() else {
                    return Err(invalid(current, input, "no reviewer owns this status"));
                };
                let acting = input.actor_role.reviewer_role();
                match acting {
                    Some(role) if role == expected => Ok(Some(role)),
                    Some(Role::Vp2) if current == RequestStatus::PendingVp => Ok(Some(Role::Vp2)),
                    _ => Err(invalid(
                        current,
                        input,
                        &format!("this step is reserved for {}", expected.label()),
                    )),
                }
            }
        }
    }

    /// Roles an approval at `current` may hand the request to, as seen by
    /// the reviewer owning the status. Empty when that approval finishes the
    /// workflow or the status has no approval edge.
    pub fn approval_targets(
        &self,
        current: RequestStatus,
        context: &TransitionContext,
    ) -> Vec<Role> {
        if let Some(target) = fixed_target(current, context) {
            return target.into_iter().collect();
        }
        match current {
            RequestStatus::PendingHead | RequestStatus::HeadApproved => {
                context.allowed_next.clone()
            }
            RequestStatus::PendingComptroller => comptroller_targets(context),
            RequestStatus::PendingVp
                if context.vp_requirement.requires_both()
                    && !context.vp_approved
                    && !context.vp2_approved =>
            {
                vec![Role::Vp2]
            }
            _ => Vec::new(),
        }
    }

    pub fn transition(
        &self,
        current: RequestStatus,
        input: &TransitionInput,
        context: &TransitionContext,
    ) -> Result<TransitionOutcome, WorkflowError> {
        use RequestStatus::{
            AdminReceived, Cancelled, Draft, HeadApproved, PendingAdmin,
            PendingComptroller, PendingHead, PendingHr, PendingParentHead, PendingVp, Rejected,
            Returned,
        };
        use WorkflowAction::{Approve, Cancel, Forward, Receive, Reject, Resubmit, Return, Submit};

        let acting = self.authorize(current, input, context)?;
        let mut approved_slot = None;

        let (to, next_role) = match (current, input.action) {
            (Draft, Submit) | (Returned, Resubmit) => {
                let entry = choose(current, input.next_role, &context.entry_roles)?;
                (RequestStatus::pending_for(entry), Some(entry))
            }
            (Rejected, Resubmit) => (Draft, None),
            (_, Cancel) => (Cancelled, None),
            (PendingAdmin, Receive) => (AdminReceived, Some(Role::Admin)),
            (HeadApproved, Forward) => {
                let next = choose_required(current, input.next_role, &context.allowed_next)?;
                (RequestStatus::pending_for(next), Some(next))
            }
            (_, Reject) => {
                require_reason(input.reason.as_deref(), "rejectionReason")?;
                (Rejected, None)
            }
            (_, Return) => {
                require_reason(input.reason.as_deref(), "returnReason")?;
                (Returned, None)
            }
            (_, Approve) => {
                check_sign_off(input, context.min_comment_chars)?;
                let Some(role) = acting else {
                    return Err(invalid(current, input, "approval requires a reviewer role"));
                };
                approved_slot = Some(role);

                match current {
                    PendingHead => match input.next_role {
                        Some(_) => {
                            let next = choose(current, input.next_role, &context.allowed_next)?;
                            (RequestStatus::pending_for(next), Some(next))
                        }
                        None => (HeadApproved, Some(Role::Head)),
                    },
                    PendingComptroller => {
                        let next = match input.next_role {
                            Some(_) => {
                                choose(current, input.next_role, &comptroller_targets(context))?
                            }
                            None => Role::Hr,
                        };
                        (RequestStatus::pending_for(next), Some(next))
                    }
                    PendingParentHead | PendingAdmin | AdminReceived | PendingHr => {
                        match fixed_target(current, context) {
                            Some(Some(next)) => fixed(current, input.next_role, next)?,
                            _ => terminal(current, input.next_role)?,
                        }
                    }
                    PendingVp => vp_sign_off(current, input, context, role)?,
                    _ => return Err(invalid(current, input, "no approval edge from this status")),
                }
            }
            _ => return Err(invalid(current, input, "no edge for this action")),
        };

        let comments = match input.action {
            Reject | Return => input.reason.clone(),
            _ => input.comments.clone(),
        };
        let event = ApprovalEvent {
            action: input.action,
            actor_role: input.actor_role,
            actor_id: input.actor_id.clone(),
            at: input.at,
            signature_ref: input.signature.clone(),
            comments,
            from_status: current,
            to_status: to,
            next_approver_role: next_role,
            next_approver_id: next_role.and(input.next_approver_id.clone()),
        };

        Ok(TransitionOutcome { from: current, to, event, approved_slot })
    }
}

fn vp_sign_off(
    current: RequestStatus,
    input: &TransitionInput,
    context: &TransitionContext,
    role: Role,
) -> Result<(RequestStatus, Option<Role>), WorkflowError> {
    let (own_filled, other_filled, other) = match role {
        Role::Vp => (context.vp_approved, context.vp2_approved, Role::Vp2),
        _ => (context.vp2_approved, context.vp_approved, Role::Vp),
    };

    if role == Role::Vp2 && !context.vp_requirement.requires_both() {
        return Err(invalid(current, input, "this department needs a single VP sign-off"));
    }
    if own_filled {
        return Err(invalid(current, input, &format!("{} has already signed", role.label())));
    }

    if context.vp_requirement.requires_both() && !other_filled {
        if input.next_role.is_some_and(|next| next != other) {
            return Err(WorkflowError::InvalidRouting {
                from: current,
                requested: input.next_role,
                allowed: vec![other],
            });
        }
        return Ok((RequestStatus::PendingVp, Some(other)));
    }
    terminal(current, input.next_role)
}

fn choose(
    from: RequestStatus,
    requested: Option<Role>,
    allowed: &[Role],
) -> Result<Role, WorkflowError> {
    match requested {
        Some(role) if allowed.contains(&role) => Ok(role),
        None => allowed.first().copied().ok_or_else(|| WorkflowError::InvalidRouting {
            from,
            requested,
            allowed: allowed.to_vec(),
        }),
        Some(_) => {
            Err(WorkflowError::InvalidRouting { from, requested, allowed: allowed.to_vec() })
        }
    }
}

fn choose_required(
    from: RequestStatus,
    requested: Option<Role>,
    allowed: &[Role],
) -> Result<Role, WorkflowError> {
    if requested.is_none() {
        return Err(WorkflowError::InvalidRouting { from, requested, allowed: allowed.to_vec() });
    }
    choose(from, requested, allowed)
}

/// Next step for statuses whose reviewer has no choice. `Some(None)` means
/// the approval is final.
fn fixed_target(current: RequestStatus, context: &TransitionContext) -> Option<Option<Role>> {
    match current {
        RequestStatus::PendingParentHead => Some(Some(Role::Admin)),
        RequestStatus::PendingAdmin | RequestStatus::AdminReceived => {
            Some(Some(if context.needs_financial_review { Role::Comptroller } else { Role::Hr }))
        }
        RequestStatus::PendingHr => Some(context.vp_requirement.requires_vp().then_some(Role::Vp)),
        _ => None,
    }
}

fn comptroller_targets(context: &TransitionContext) -> Vec<Role> {
    if context.allowed_next.is_empty() {
        vec![Role::Hr]
    } else {
        context.allowed_next.clone()
    }
}

fn fixed(
    from: RequestStatus,
    requested: Option<Role>,
    next: Role,
) -> Result<(RequestStatus, Option<Role>), WorkflowError> {
    match requested {
        Some(role) if role != next => {
            Err(WorkflowError::InvalidRouting { from, requested, allowed: vec![next] })
        }
        _ => Ok((RequestStatus::pending_for(next), Some(next))),
    }
}

fn terminal(
    from: RequestStatus,
    requested: Option<Role>,
) -> Result<(RequestStatus, Option<Role>), WorkflowError> {
    match requested {
        Some(_) => Err(WorkflowError::InvalidRouting { from, requested, allowed: Vec::new() }),
        None => Ok((RequestStatus::Approved, None)),
    }
}

fn require_reason(reason: Option<&str>, field: &str) -> Result<(), WorkflowError> {
    match reason.map(str::trim) {
        Some(reason) if !reason.is_empty() => Ok(()),
        _ => Err(WorkflowError::Validation { fields: field_error(field, "a reason is required") }),
    }
}

/// Signature and comment checks for an approval. Both are reported at once.
fn check_sign_off(input: &TransitionInput, min_comment_chars: usize) -> Result<(), WorkflowError> {
    let mut fields = FieldErrors::new();

    if input.signature.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        fields.insert("signature".to_string(), "a signature is required to approve".to_string());
    }
    let comment_chars =
        input.comments.as_deref().map(|comments| comments.trim().chars().count()).unwrap_or(0);
    if comment_chars < min_comment_chars {
        fields.insert(
            "comments".to_string(),
            format!("comments must be at least {min_comment_chars} characters"),
        );
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::PreconditionUnmet { fields })
    }
}

fn invalid(current: RequestStatus, input: &TransitionInput, detail: &str) -> WorkflowError {
    WorkflowError::InvalidTransition {
        from: current,
        action: input.action,
        actor: input.actor_role,
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{StatusStateMachine, TransitionContext, TransitionInput};
    use crate::domain::event::WorkflowAction;
    use crate::domain::role::{ActorRole, Role};
    use crate::domain::status::RequestStatus;
    use crate::errors::WorkflowError;
    use crate::workflow::policy::VpRequirement;

    fn context() -> TransitionContext {
        TransitionContext {
            requester_id: "u-faculty".to_owned(),
            entry_roles: vec![Role::Head],
            allowed_next: vec![Role::ParentHead, Role::Admin, Role::Hr],
            needs_financial_review: false,
            vp_requirement: VpRequirement::None,
            vp_approved: false,
            vp2_approved: false,
            min_comment_chars: 10,
        }
    }

    fn by(action: WorkflowAction, role: ActorRole) -> TransitionInput {
        TransitionInput {
            action,
            actor_role: role,
            actor_id: match role {
                ActorRole::Requester => "u-faculty".to_owned(),
                ActorRole::Reviewer(role) => format!("u-{role}"),
            },
            signature: Some("sig://on-file".to_owned()),
            comments: Some("Reviewed and endorsed.".to_owned()),
            reason: None,
            next_role: None,
            next_approver_id: None,
            at: Utc::now(),
        }
    }

    fn head() -> ActorRole {
        ActorRole::Reviewer(Role::Head)
    }

    #[test]
    fn submit_moves_draft_to_first_receiver() {
        let machine = StatusStateMachine;
        let outcome = machine
            .transition(
                machine.initial_status(),
                &by(WorkflowAction::Submit, ActorRole::Requester),
                &context(),
            )
            .expect("draft -> pending_head");

        assert_eq!(outcome.to, RequestStatus::PendingHead);
        assert_eq!(outcome.event.next_approver_role, Some(Role::Head));
        assert_eq!(outcome.event.from_status, RequestStatus::Draft);
    }

    #[test]
    fn head_approval_is_a_fork_point() {
        let machine = StatusStateMachine;
        let mut input = by(WorkflowAction::Approve, head());
        input.next_role = Some(Role::ParentHead);
        input.next_approver_id = Some("u-dean".to_owned());

        let outcome = machine
            .transition(RequestStatus::PendingHead, &input, &context())
            .expect("head routes to parent head");
        assert_eq!(outcome.to, RequestStatus::PendingParentHead);
        assert_eq!(outcome.approved_slot, Some(Role::Head));
        assert_eq!(outcome.event.next_approver_id.as_deref(), Some("u-dean"));

        input.next_role = None;
        let parked = machine
            .transition(RequestStatus::PendingHead, &input, &context())
            .expect("head approves without choosing");
        assert_eq!(parked.to, RequestStatus::HeadApproved);
    }

    #[test]
    fn fork_choice_outside_allowed_set_is_invalid_routing() {
        let mut input = by(WorkflowAction::Approve, head());
        input.next_role = Some(Role::Vp);

        let error = StatusStateMachine
            .transition(RequestStatus::PendingHead, &input, &context())
            .expect_err("vp is not allowed");
        assert!(matches!(error, WorkflowError::InvalidRouting { requested: Some(Role::Vp), .. }));
    }

    #[test]
    fn forward_from_head_approved_requires_a_choice() {
        let machine = StatusStateMachine;
        let mut input = by(WorkflowAction::Forward, head());

        let error = machine
            .transition(RequestStatus::HeadApproved, &input, &context())
            .expect_err("next role is required");
        assert!(matches!(error, WorkflowError::InvalidRouting { requested: None, .. }));

        input.next_role = Some(Role::Admin);
        let outcome = machine
            .transition(RequestStatus::HeadApproved, &input, &context())
            .expect("forward to admin");
        assert_eq!(outcome.to, RequestStatus::PendingAdmin);
        assert_eq!(outcome.approved_slot, None);
    }

    #[test]
    fn admin_edge_follows_financial_review() {
        let machine = StatusStateMachine;
        let admin = by(WorkflowAction::Approve, ActorRole::Reviewer(Role::Admin));
        let mut ctx = context();

        let plain = machine.transition(RequestStatus::PendingAdmin, &admin, &ctx).expect("to hr");
        assert_eq!(plain.to, RequestStatus::PendingHr);

        ctx.needs_financial_review = true;
        let reviewed =
            machine.transition(RequestStatus::AdminReceived, &admin, &ctx).expect("to comptroller");
        assert_eq!(reviewed.to, RequestStatus::PendingComptroller);
    }

    #[test]
    fn receive_acknowledges_intake_without_signature() {
        let mut input = by(WorkflowAction::Receive, ActorRole::Reviewer(Role::Admin));
        input.signature = None;
        input.comments = None;

        let outcome = StatusStateMachine
            .transition(RequestStatus::PendingAdmin, &input, &context())
            .expect("admin receives");
        assert_eq!(outcome.to, RequestStatus::AdminReceived);
    }

    #[test]
    fn hr_approval_goes_to_vp_only_when_required() {
        let machine = StatusStateMachine;
        let hr = by(WorkflowAction::Approve, ActorRole::Reviewer(Role::Hr));
        let mut ctx = context();

        assert_eq!(
            machine.transition(RequestStatus::PendingHr, &hr, &ctx).expect("approved").to,
            RequestStatus::Approved
        );

        ctx.vp_requirement = VpRequirement::Single;
        assert_eq!(
            machine.transition(RequestStatus::PendingHr, &hr, &ctx).expect("pending vp").to,
            RequestStatus::PendingVp
        );
    }

    #[test]
    fn dual_vp_requirement_waits_for_both_slots() {
        let machine = StatusStateMachine;
        let mut ctx = context();
        ctx.vp_requirement = VpRequirement::Dual;

        let first = machine
            .transition(
                RequestStatus::PendingVp,
                &by(WorkflowAction::Approve, ActorRole::Reviewer(Role::Vp)),
                &ctx,
            )
            .expect("first vp signs");
        assert_eq!(first.to, RequestStatus::PendingVp);
        assert_eq!(first.event.next_approver_role, Some(Role::Vp2));

        ctx.vp_approved = true;
        let repeat = machine
            .transition(
                RequestStatus::PendingVp,
                &by(WorkflowAction::Approve, ActorRole::Reviewer(Role::Vp)),
                &ctx,
            )
            .expect_err("same slot twice");
        assert!(matches!(repeat, WorkflowError::InvalidTransition { .. }));

        let second = machine
            .transition(
                RequestStatus::PendingVp,
                &by(WorkflowAction::Approve, ActorRole::Reviewer(Role::Vp2)),
                &ctx,
            )
            .expect("second vp signs");
        assert_eq!(second.to, RequestStatus::Approved);
        assert_eq!(second.approved_slot, Some(Role::Vp2));
    }

    #[test]
    fn second_vp_is_refused_when_single_sign_off_is_enough() {
        let mut ctx = context();
        ctx.vp_requirement = VpRequirement::Single;

        let error = StatusStateMachine
            .transition(
                RequestStatus::PendingVp,
                &by(WorkflowAction::Approve, ActorRole::Reviewer(Role::Vp2)),
                &ctx,
            )
            .expect_err("vp2 not needed");
        assert!(matches!(error, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn approval_without_signature_or_long_comments_is_precondition_unmet() {
        for role in [Role::Head, Role::Admin, Role::Comptroller, Role::Hr] {
            let mut input = by(WorkflowAction::Approve, ActorRole::Reviewer(role));
            input.signature = None;
            input.comments = Some("ok".to_owned());

            let error = StatusStateMachine
                .transition(RequestStatus::pending_for(role), &input, &context())
                .expect_err("sign-off incomplete");
            let WorkflowError::PreconditionUnmet { fields } = error else {
                panic!("expected precondition failure for {role}");
            };
            assert!(fields.contains_key("signature"));
            assert!(fields.contains_key("comments"));
        }
    }

    #[test]
    fn reject_requires_reason() {
        let mut input = by(WorkflowAction::Reject, head());
        input.reason = Some(String::new());

        let error = StatusStateMachine
            .transition(RequestStatus::PendingHead, &input, &context())
            .expect_err("empty reason");
        let WorkflowError::Validation { fields } = error else {
            panic!("expected validation error");
        };
        assert!(fields.contains_key("rejectionReason"));
    }

    #[test]
    fn wrong_reviewer_is_invalid_transition() {
        let error = StatusStateMachine
            .transition(
                RequestStatus::PendingHead,
                &by(WorkflowAction::Approve, ActorRole::Reviewer(Role::Hr)),
                &context(),
            )
            .expect_err("hr cannot act on pending_head");
        assert!(matches!(error, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn only_the_requester_may_cancel_or_resubmit() {
        let machine = StatusStateMachine;
        let mut input = by(WorkflowAction::Cancel, ActorRole::Requester);
        input.actor_id = "u-someone-else".to_owned();
        assert!(machine.transition(RequestStatus::PendingHr, &input, &context()).is_err());

        input.actor_id = "u-faculty".to_owned();
        let outcome =
            machine.transition(RequestStatus::PendingHr, &input, &context()).expect("cancel");
        assert_eq!(outcome.to, RequestStatus::Cancelled);

        let resubmit = by(WorkflowAction::Resubmit, ActorRole::Requester);
        let draft =
            machine.transition(RequestStatus::Rejected, &resubmit, &context()).expect("reopen");
        assert_eq!(draft.to, RequestStatus::Draft);
    }

    #[test]
    fn terminal_states_forbid_further_actions() {
        let machine = StatusStateMachine;
        for status in [RequestStatus::Approved, RequestStatus::Cancelled] {
            for input in [
                by(WorkflowAction::Approve, head()),
                by(WorkflowAction::Cancel, ActorRole::Requester),
                by(WorkflowAction::Resubmit, ActorRole::Requester),
            ] {
                assert!(machine.transition(status, &input, &context()).is_err());
            }
        }
    }

    #[test]
    fn fixed_edges_advertise_only_their_target() {
        let machine = StatusStateMachine;
        let mut context = context();

        assert_eq!(machine.approval_targets(RequestStatus::PendingAdmin, &context), vec![Role::Hr]);
        assert_eq!(
            machine.approval_targets(RequestStatus::PendingParentHead, &context),
            vec![Role::Admin]
        );
        assert_eq!(machine.approval_targets(RequestStatus::PendingHr, &context), Vec::new());
        assert_eq!(
            machine.approval_targets(RequestStatus::PendingHead, &context),
            context.allowed_next
        );

        context.needs_financial_review = true;
        context.vp_requirement = VpRequirement::Dual;
        assert_eq!(
            machine.approval_targets(RequestStatus::AdminReceived, &context),
            vec![Role::Comptroller]
        );
        assert_eq!(machine.approval_targets(RequestStatus::PendingHr, &context), vec![Role::Vp]);
        assert_eq!(machine.approval_targets(RequestStatus::PendingVp, &context), vec![Role::Vp2]);

        context.vp_approved = true;
        assert_eq!(machine.approval_targets(RequestStatus::PendingVp, &context), Vec::new());
    }
}
