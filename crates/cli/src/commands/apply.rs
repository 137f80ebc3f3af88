use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use travelink_core::config::LoadOptions;
use travelink_core::domain::event::{ApprovalEvent, WorkflowAction};
use travelink_core::domain::request::Request;
use travelink_core::domain::role::{Actor, ActorRole, Role};
use travelink_core::domain::status::RequestStatus;
use travelink_core::workflow::{ActionPayload, SubmissionQuota};

use crate::commands::route::processor;
use crate::commands::{load_config, read_request, CommandResult, EXIT_INPUT};

pub struct ApplyArgs<'a> {
    pub file: &'a Path,
    pub action: &'a str,
    pub actor_id: &'a str,
    pub actor_name: Option<&'a str>,
    pub actor_role: &'a str,
    pub signature: Option<&'a str>,
    pub comments: Option<&'a str>,
    pub reason: Option<&'a str>,
    pub next: Option<&'a str>,
    pub next_approver_id: Option<&'a str>,
    pub at: Option<&'a str>,
    pub output: Option<&'a Path>,
    pub quota: SubmissionQuota,
}

#[derive(Debug, Serialize)]
struct ApplyReport {
    request_id: String,
    from: RequestStatus,
    to: RequestStatus,
    version: u64,
    event: Option<ApprovalEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<Request>,
}

/// Runs one action against a request document. The file is only rewritten
/// when `output` is given.
pub fn run(options: &LoadOptions, args: &ApplyArgs<'_>) -> CommandResult {
    let config = match load_config("apply", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let request = match read_request("apply", args.file) {
        Ok(request) => request,
        Err(failure) => return failure,
    };
    let (action, actor, payload, at) = match parse_args(args) {
        Ok(parsed) => parsed,
        Err(message) => return CommandResult::failure("apply", "input", message, EXIT_INPUT),
    };

    let applied =
        processor(&config).apply_with_quota(&request, action, &actor, &payload, &args.quota, at);
    let updated = match applied {
        Ok(updated) => updated,
        Err(error) => {
            tracing::warn!(
                event_name = "cli.apply.rejected",
                request_id = %request.id.0,
                action = %action,
                error_class = error.class(),
                "action refused"
            );
            return CommandResult::workflow_failure("apply", &error);
        }
    };

    if let Some(output) = args.output {
        if let Err(message) = write_request(output, &updated) {
            return CommandResult::failure("apply", "output", message, EXIT_INPUT);
        }
    }

    tracing::info!(
        event_name = "cli.apply.applied",
        request_id = %updated.id.0,
        action = %action,
        from = %request.status,
        to = %updated.status,
        "action applied"
    );

    let message = format!("{action}: {} -> {}", request.status, updated.status);
    let report = ApplyReport {
        request_id: updated.id.0.clone(),
        from: request.status,
        to: updated.status,
        version: updated.version,
        event: updated.last_event().cloned(),
        request: args.output.is_none().then_some(updated),
    };
    CommandResult::report("apply", message, report)
}

fn parse_args(
    args: &ApplyArgs<'_>,
) -> Result<(WorkflowAction, Actor, ActionPayload, DateTime<Utc>), String> {
    let action = WorkflowAction::parse(args.action)
        .ok_or_else(|| format!("unknown action `{}`", args.action))?;
    let role = ActorRole::parse(args.actor_role)
        .ok_or_else(|| format!("unknown actor role `{}`", args.actor_role))?;
    let next_approver_role = args
        .next
        .map(|raw| Role::parse(raw).ok_or_else(|| format!("unknown next role `{raw}`")))
        .transpose()?;
    let at = match args.at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|error| format!("--at must be RFC 3339: {error}"))?,
        None => Utc::now(),
    };

    let actor = Actor {
        id: args.actor_id.to_string(),
        name: args.actor_name.unwrap_or(args.actor_id).to_string(),
        role,
    };
    let payload = ActionPayload {
        signature: args.signature.map(str::to_string),
        comments: args.comments.map(str::to_string),
        reason: args.reason.map(str::to_string),
        next_approver_role,
        next_approver_id: args.next_approver_id.map(str::to_string),
    };

    Ok((action, actor, payload, at))
}

fn write_request(path: &Path, request: &Request) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(request)
        .map_err(|error| format!("could not serialize request: {error}"))?;
    fs::write(path, rendered)
        .map_err(|error| format!("could not write `{}`: {error}", path.display()))
}
