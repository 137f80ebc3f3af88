use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::event::WorkflowAction;
use crate::domain::request::{TravelReason, VehicleMode};
use crate::domain::role::{ActorRole, Role};
use crate::domain::status::RequestStatus;
use crate::repository::RepositoryError;

/// Field key → human-readable reason. Keys use the wire names of request
/// fields (`rejectionReason`, `coRequesters.<id>`, ...).
pub type FieldErrors = BTreeMap<String, String>;

pub fn field_error(field: impl Into<String>, reason: impl Into<String>) -> FieldErrors {
    let mut fields = FieldErrors::new();
    fields.insert(field.into(), reason.into());
    fields
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("invalid transition: cannot {action} from {from} as {actor}")]
    InvalidTransition {
        from: RequestStatus,
        action: WorkflowAction,
        actor: ActorRole,
        detail: String,
    },
    #[error("precondition unmet on {} field(s)", .fields.len())]
    PreconditionUnmet { fields: FieldErrors },
    #[error("invalid routing from {from}: {requested:?} is not one of {allowed:?}")]
    InvalidRouting { from: RequestStatus, requested: Option<Role>, allowed: Vec<Role> },
    #[error("concurrency conflict on request {request_id}: {detail}")]
    ConcurrencyConflict { request_id: String, detail: String },
    #[error("validation failed on {} field(s)", .fields.len())]
    Validation { fields: FieldErrors },
}

impl WorkflowError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::PreconditionUnmet { .. } => "precondition_unmet",
            Self::InvalidRouting { .. } => "invalid_routing",
            Self::ConcurrencyConflict { .. } => "concurrency_conflict",
            Self::Validation { .. } => "validation",
        }
    }

    /// Every variant surfaces a field map so callers can highlight inputs.
    pub fn fields(&self) -> FieldErrors {
        match self {
            Self::InvalidTransition { detail, .. } => field_error("status", detail.clone()),
            Self::PreconditionUnmet { fields } | Self::Validation { fields } => fields.clone(),
            Self::InvalidRouting { requested, allowed, .. } => {
                let allowed = allowed.iter().map(Role::as_str).collect::<Vec<_>>().join(", ");
                let reason = match requested {
                    Some(role) => format!("{role} is not allowed here; choose one of [{allowed}]"),
                    None => format!("a next approver is required; choose one of [{allowed}]"),
                };
                field_error("nextApproverRole", reason)
            }
            Self::ConcurrencyConflict { detail, .. } => field_error("version", detail.clone()),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("vehicle mode cannot change after the request was first submitted")]
    VehicleModeFrozen,
    #[error("travel reason {reason:?} locks the vehicle mode to {mode:?}")]
    VehicleModeLocked { reason: TravelReason, mode: VehicleMode },
    #[error("total budget cannot be negative: {0}")]
    NegativeBudget(Decimal),
    #[error("{list} cannot change once an invitee has responded")]
    InvitationsFrozen { list: &'static str },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("request not found: {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::ConcurrencyConflict { request_id, detail } => {
                Self::Workflow(WorkflowError::ConcurrencyConflict { request_id, detail })
            }
            RepositoryError::Backend(message) | RepositoryError::Decode(message) => {
                Self::Persistence(message)
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, fields: FieldErrors, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, fields: FieldErrors, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check the highlighted fields and try again."
            }
            Self::Conflict { .. } => {
                "The request was changed by someone else. Reload it and try again."
            }
            Self::NotFound { .. } => "The request could not be found.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn fields(&self) -> FieldErrors {
        match self {
            Self::BadRequest { fields, .. } | Self::Conflict { fields, .. } => fields.clone(),
            _ => FieldErrors::new(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Workflow(error @ WorkflowError::ConcurrencyConflict { .. }) => {
                Self::Conflict {
                    message: error.to_string(),
                    fields: error.fields(),
                    correlation_id: unassigned,
                }
            }
            ApplicationError::Workflow(error) => Self::BadRequest {
                message: error.to_string(),
                fields: error.fields(),
                correlation_id: unassigned,
            },
            ApplicationError::Domain(error) => Self::BadRequest {
                message: "domain validation failed".to_owned(),
                fields: field_error("request", error.to_string()),
                correlation_id: unassigned,
            },
            ApplicationError::NotFound(id) => {
                Self::NotFound { message: format!("request {id}"), correlation_id: unassigned }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}
