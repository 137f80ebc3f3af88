pub mod gate;
pub mod policy;
pub mod processor;
pub mod routing;
pub mod service;
pub mod state_machine;
pub mod suggestion;

pub use gate::{
    ConfirmationGate, SubmissionQuota, SubmitContext, ValidationResult, DAILY_VEHICLE_REQUEST_LIMIT,
};
pub use policy::{DepartmentPolicy, StaticDepartmentPolicy, VpRequirement};
pub use processor::{ActionPayload, ApprovalActionProcessor, SendToOptions};
pub use routing::{RoutingAttributes, RoutingEngine, WorkflowProgress};
pub use service::WorkflowService;
pub use state_machine::{StatusStateMachine, TransitionContext, TransitionInput, TransitionOutcome};
pub use suggestion::{
    match_suggested_approver, suggest_next_approver, ApproverCandidate, Suggestion,
    SuggestionFlags,
};
