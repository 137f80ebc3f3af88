use std::path::Path;

use chrono::{NaiveDate, Utc};
use travelink_core::config::LoadOptions;
use travelink_core::workflow::{SubmissionQuota, SubmitContext};

use crate::commands::route::processor;
use crate::commands::{load_config, read_request, CommandResult, EXIT_INPUT};

pub struct CheckArgs<'a> {
    pub file: &'a Path,
    pub submitter: &'a str,
    pub signature: Option<&'a str>,
    pub today: Option<&'a str>,
    pub quota: SubmissionQuota,
}

/// Runs the submission gate; a failing gate is a `validation` error.
pub fn run(options: &LoadOptions, args: &CheckArgs<'_>) -> CommandResult {
    let config = match load_config("check", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let request = match read_request("check", args.file) {
        Ok(request) => request,
        Err(failure) => return failure,
    };
    let today = match args.today {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(error) => {
                return CommandResult::failure(
                    "check",
                    "input",
                    format!("--today must be YYYY-MM-DD: {error}"),
                    EXIT_INPUT,
                );
            }
        },
        None => Utc::now().date_naive(),
    };

    let context = SubmitContext {
        submitter_name: args.submitter.to_string(),
        submitter_signature: args.signature.map(str::to_string),
        today,
        quota: args.quota.clone(),
    };
    let result = processor(&config).can_submit(&request, &context);
    match result.into_result() {
        Ok(()) => CommandResult::success("check", format!("{} is ready to submit", request.id.0)),
        Err(error) => CommandResult::workflow_failure("check", &error),
    }
}
