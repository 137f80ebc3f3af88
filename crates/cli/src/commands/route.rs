use std::path::Path;

use serde::Serialize;
use travelink_core::config::{AppConfig, LoadOptions};
use travelink_core::domain::role::Role;
use travelink_core::domain::status::RequestStatus;
use travelink_core::workflow::{
    ApprovalActionProcessor, SendToOptions, StaticDepartmentPolicy, VpRequirement,
    WorkflowProgress,
};

use crate::commands::{load_config, read_request, CommandResult};

#[derive(Debug, Serialize)]
struct RouteReport {
    request_id: String,
    status: RequestStatus,
    first_receiver: Role,
    entry_options: Vec<Role>,
    path: Vec<Role>,
    needs_financial_review: bool,
    vp_requirement: VpRequirement,
    send_to: SendToOptions,
    progress: WorkflowProgress,
}

pub(crate) fn processor(config: &AppConfig) -> ApprovalActionProcessor<StaticDepartmentPolicy> {
    ApprovalActionProcessor::new(config.department_policy())
        .with_min_comment_chars(config.workflow.min_comment_chars)
}

pub fn run(options: &LoadOptions, file: &Path) -> CommandResult {
    let config = match load_config("route", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let request = match read_request("route", file) {
        Ok(request) => request,
        Err(failure) => return failure,
    };

    let processor = processor(&config);
    let routing = processor.routing();
    let report = RouteReport {
        request_id: request.id.0.clone(),
        status: request.status,
        first_receiver: routing.first_receiver(&request),
        entry_options: routing.entry_options(&request),
        path: routing.full_approval_path(&request),
        needs_financial_review: routing.needs_financial_review(&request),
        vp_requirement: routing.vp_requirement(&request),
        send_to: processor.send_to_options(&request),
        progress: routing.progress(&request),
    };

    let message = format!(
        "{} enters at {} via {}",
        report.request_id,
        report.first_receiver,
        report.path.iter().map(Role::as_str).collect::<Vec<_>>().join(" > ")
    );
    CommandResult::report("route", message, report)
}
