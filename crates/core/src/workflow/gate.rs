use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::request::{
    Invitation, InvitationStatus, Request, RequestDetails, RequesterRole,
};
use crate::errors::{FieldErrors, WorkflowError};

/// Vehicle requests allowed to depart on the same day.
pub const DAILY_VEHICLE_REQUEST_LIMIT: u32 = 5;

/// Counters the gate cannot derive from the request itself. Unknown
/// values skip their check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionQuota {
    /// Vehicle requests already booked for the departure day.
    #[serde(default)]
    pub vehicle_requests_that_day: u32,
    #[serde(default)]
    pub department_budget_remaining: Option<Decimal>,
}

/// Who is submitting, and when.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitContext {
    pub submitter_name: String,
    pub submitter_signature: Option<String>,
    pub today: NaiveDate,
    #[serde(default)]
    pub quota: SubmissionQuota,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub errors: FieldErrors,
}

impl ValidationResult {
    pub fn into_result(self) -> Result<(), WorkflowError> {
        if self.ok {
            Ok(())
        } else {
            Err(WorkflowError::Validation { fields: self.errors })
        }
    }
}

/// Multi-party submission gate. Every check runs so the caller can surface
/// all problems at once.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfirmationGate;

impl ConfirmationGate {
    pub fn can_submit(&self, request: &Request, context: &SubmitContext) -> ValidationResult {
        let mut errors = FieldErrors::new();

        match &request.details {
            RequestDetails::TravelOrder(travel) => {
                require_text(&mut errors, "requestingPerson", &travel.requesting_person);
                require_text(&mut errors, "destination", &travel.destination);
                require_text(&mut errors, "purpose", &travel.purpose);
                check_dates(
                    &mut errors,
                    ("departureDate", travel.departure_date),
                    ("returnDate", travel.return_date),
                    context.today,
                );

                let on_behalf = !same_person(&travel.requesting_person, &context.submitter_name);
                if on_behalf && is_blank(travel.requesting_person_signature.as_deref()) {
                    errors.insert(
                        "requestingPersonSignature".to_string(),
                        format!(
                            "{} must sign when the request is submitted on their behalf",
                            travel.requesting_person.trim()
                        ),
                    );
                }

                if request.requester_role == RequesterRole::Faculty && !request.head_included {
                    errors.insert(
                        "headIncluded".to_string(),
                        "faculty cannot travel alone; include the department head".to_string(),
                    );
                }
                if travel.needs_vehicle
                    && context.quota.vehicle_requests_that_day >= DAILY_VEHICLE_REQUEST_LIMIT
                {
                    errors.insert(
                        "needsVehicle".to_string(),
                        format!("only {DAILY_VEHICLE_REQUEST_LIMIT} vehicle requests per day"),
                    );
                }
            }
            RequestDetails::Seminar(seminar) => {
                require_text(&mut errors, "title", &seminar.title);
                require_text(&mut errors, "venue", &seminar.venue);
                require_text(&mut errors, "purpose", &seminar.purpose);
                check_dates(
                    &mut errors,
                    ("startDate", seminar.start_date),
                    ("endDate", seminar.end_date),
                    context.today,
                );
            }
            RequestDetails::Maintenance(maintenance) => {
                require_text(&mut errors, "vehicleId", &maintenance.vehicle_id);
                require_text(&mut errors, "description", &maintenance.description);
                match maintenance.scheduled_date {
                    None => {
                        errors.insert("scheduledDate".to_string(), "required".to_string());
                    }
                    Some(date) if date < context.today => {
                        errors.insert(
                            "scheduledDate".to_string(),
                            "cannot be in the past".to_string(),
                        );
                    }
                    Some(_) => {}
                }
            }
        }

        if is_blank(context.submitter_signature.as_deref()) {
            errors.insert("signature".to_string(), "the submitter must sign".to_string());
        }

        if request.total_budget < Decimal::ZERO {
            errors.insert("totalBudget".to_string(), "cannot be negative".to_string());
        } else if request.total_budget > Decimal::ZERO
            && is_blank(request.budget_justification.as_deref())
        {
            errors.insert(
                "budgetJustification".to_string(),
                "a justification is required when a budget is requested".to_string(),
            );
        }
        if let Some(remaining) = context.quota.department_budget_remaining {
            if request.total_budget > Decimal::ZERO && request.total_budget > remaining {
                errors.insert(
                    "totalBudget".to_string(),
                    format!("exceeds the remaining department budget of {remaining}"),
                );
            }
        }

        check_quorum(&mut errors, "coRequesters", &request.co_requesters);
        check_quorum(&mut errors, "participants", request.participants());
        check_endorsements(&mut errors, request);

        ValidationResult { ok: errors.is_empty(), errors }
    }
}

/// Invited entries must have confirmed. With more than one entry, an entry
/// that was never invited blocks too.
fn check_quorum(errors: &mut FieldErrors, list: &str, entries: &[Invitation]) {
    for entry in entries {
        let reason = match (entry.was_invited(), entry.invitation_status) {
            (_, InvitationStatus::Confirmed) => continue,
            (true, InvitationStatus::Declined) => "declined the invitation",
            (true, InvitationStatus::Pending) => "has not confirmed the invitation yet",
            (false, _) if entries.len() > 1 => "must be invited before submitting",
            (false, _) => continue,
        };
        let name = if entry.name.trim().is_empty() { &entry.id } else { &entry.name };
        errors.insert(format!("{list}.{}", entry.id), format!("{} {reason}", name.trim()));
    }
}

fn check_endorsements(errors: &mut FieldErrors, request: &Request) {
    let departments: BTreeSet<&str> = request
        .co_requesters
        .iter()
        .map(|entry| entry.department.trim())
        .filter(|department| !department.is_empty())
        .collect();
    if departments.len() <= 1 {
        return;
    }

    for department in departments {
        let confirmed = request.head_endorsements.iter().any(|endorsement| {
            endorsement.department.trim() == department
                && endorsement.status == InvitationStatus::Confirmed
        });
        if !confirmed {
            errors.insert(
                format!("headEndorsements.{department}"),
                format!("the head of {department} has not endorsed this request"),
            );
        }
    }
}

fn check_dates(
    errors: &mut FieldErrors,
    start: (&str, Option<NaiveDate>),
    end: (&str, Option<NaiveDate>),
    today: NaiveDate,
) {
    for (field, date) in [start, end] {
        match date {
            None => {
                errors.insert(field.to_string(), "required".to_string());
            }
            Some(date) if date < today => {
                errors.insert(field.to_string(), "cannot be in the past".to_string());
            }
            Some(_) => {}
        }
    }

    if let (Some(first), Some(last)) = (start.1, end.1) {
        if first > last {
            errors.insert(end.0.to_string(), format!("must not be before {}", start.0));
        }
    }
}

fn require_text(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field.to_string(), "required".to_string());
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).unwrap_or_default().is_empty()
}

fn same_person(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}
