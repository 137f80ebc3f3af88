pub mod apply;
pub mod check;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod route;

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use travelink_core::config::{AppConfig, LoadOptions};
use travelink_core::domain::request::Request;
use travelink_core::errors::{FieldErrors, WorkflowError};

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DB_CONNECTIVITY: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_INPUT: u8 = 6;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::emit(0, outcome(command, "ok", None, message.into()))
    }

    /// Success carrying a structured report under `result`.
    pub fn report(command: &str, message: impl Into<String>, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => {
                let mut payload = outcome(command, "ok", None, message.into());
                payload.result = Some(value);
                Self::emit(0, payload)
            }
            Err(error) => Self::failure(
                command,
                "serialization",
                format!("could not serialize result: {error}"),
                EXIT_RUNTIME,
            ),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::emit(exit_code, outcome(command, "error", Some(error_class), message.into()))
    }

    /// Maps a workflow refusal onto its class, field map and exit code.
    pub fn workflow_failure(command: &str, error: &WorkflowError) -> Self {
        let mut payload = outcome(command, "error", Some(error.class()), error.to_string());
        let fields = error.fields();
        if !fields.is_empty() {
            payload.fields = Some(fields);
        }
        Self::emit(workflow_exit_code(error), payload)
    }

    fn emit(exit_code: u8, payload: CommandOutcome) -> Self {
        Self { exit_code, output: serialize_payload(payload) }
    }
}

pub fn workflow_exit_code(error: &WorkflowError) -> u8 {
    match error {
        WorkflowError::Validation { .. } => 7,
        WorkflowError::PreconditionUnmet { .. } => 8,
        WorkflowError::InvalidTransition { .. } => 9,
        WorkflowError::InvalidRouting { .. } => 10,
        WorkflowError::ConcurrencyConflict { .. } => 11,
    }
}

fn outcome(
    command: &str,
    status: &str,
    error_class: Option<&str>,
    message: String,
) -> CommandOutcome {
    CommandOutcome {
        command: command.to_string(),
        status: status.to_string(),
        error_class: error_class.map(str::to_string),
        message,
        fields: None,
        result: None,
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(
    command: &str,
    options: &LoadOptions,
) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.clone()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })
}

pub(crate) fn read_request(command: &str, path: &Path) -> Result<Request, CommandResult> {
    let raw = fs::read_to_string(path).map_err(|error| {
        CommandResult::failure(
            command,
            "input",
            format!("could not read `{}`: {error}", path.display()),
            EXIT_INPUT,
        )
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        CommandResult::failure(
            command,
            "input",
            format!("`{}` is not a request document: {error}", path.display()),
            EXIT_INPUT,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME,
        )
    })
}
