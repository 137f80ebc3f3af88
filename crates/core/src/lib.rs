pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod repository;
pub mod workflow;

pub use domain::event::{ApprovalEvent, WorkflowAction};
pub use domain::request::{
    HeadEndorsement, Invitation, InvitationStatus, MaintenanceDetails, Request, RequestDetails,
    RequestId, RequestKind, RequesterRole, RoleApproval, RoleApprovals, RoutingSnapshot,
    SeminarDetails, TravelOrderDetails, TravelReason, VehicleMode,
};
pub use domain::role::{Actor, ActorRole, Role};
pub use domain::status::RequestStatus;
pub use errors::{ApplicationError, DomainError, FieldErrors, InterfaceError, WorkflowError};
pub use notify::{
    InMemoryNotificationDispatcher, Notification, NotificationDispatcher, NotifyError,
    TracingNotificationDispatcher,
};
pub use repository::{RepositoryError, RequestRepository, Revision};
pub use workflow::{
    ActionPayload, ApprovalActionProcessor, ConfirmationGate, DepartmentPolicy, RoutingEngine,
    StaticDepartmentPolicy, StatusStateMachine, SubmissionQuota, SubmitContext, Suggestion,
    ValidationResult, VpRequirement, WorkflowService,
};
