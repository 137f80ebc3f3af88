pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use travelink_core::config::LoadOptions;
use travelink_core::workflow::SubmissionQuota;

use crate::commands::{apply::ApplyArgs, check::CheckArgs, CommandResult};

#[derive(Debug, Parser)]
#[command(
    name = "travelink",
    about = "Travelink approval workflow CLI",
    long_about = "Inspect routing, check submissions and apply workflow actions to request \
                  documents, plus configuration and database readiness commands.",
    after_help = "Examples:\n  travelink route --file request.json\n  \
                  travelink apply --file request.json --action submit --actor-id u-ana \
                  --actor-role requester --signature sig://ana\n  travelink doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this TOML file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Show first receiver, approval path and send-to options for a request")]
    Route {
        #[arg(long)]
        file: PathBuf,
    },
    #[command(about = "Run the submission gate against a draft request")]
    Check {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, help = "Name of the person submitting")]
        submitter: String,
        #[arg(long)]
        signature: Option<String>,
        #[arg(long, help = "Submission day as YYYY-MM-DD (defaults to today)")]
        today: Option<String>,
        #[command(flatten)]
        quota: QuotaArgs,
    },
    #[command(about = "Apply one workflow action to a request document")]
    Apply {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        action: String,
        #[arg(long)]
        actor_id: String,
        #[arg(long)]
        actor_name: Option<String>,
        #[arg(long, help = "`requester` or a reviewer role such as `head` or `hr`")]
        actor_role: String,
        #[arg(long)]
        signature: Option<String>,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long, help = "Explicit next approver role")]
        next: Option<String>,
        #[arg(long)]
        next_approver_id: Option<String>,
        #[arg(long, help = "Action timestamp (RFC 3339, defaults to now)")]
        at: Option<String>,
        #[arg(long, help = "Write the updated request to this path")]
        output: Option<PathBuf>,
        #[command(flatten)]
        quota: QuotaArgs,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, department policy and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

/// Booking counters checked when a request is submitted.
#[derive(Debug, Args)]
struct QuotaArgs {
    #[arg(
        long,
        default_value_t = 0,
        help = "Vehicle requests already booked for the departure day"
    )]
    vehicle_requests_that_day: u32,
    #[arg(long, help = "Remaining department budget; omit to skip the budget check")]
    budget_remaining: Option<Decimal>,
}

impl QuotaArgs {
    fn quota(&self) -> SubmissionQuota {
        SubmissionQuota {
            vehicle_requests_that_day: self.vehicle_requests_that_day,
            department_budget_remaining: self.budget_remaining,
        }
    }
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            ..LoadOptions::default()
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let options = cli.load_options();

    let result = match &cli.command {
        Command::Route { file } => commands::route::run(&options, file),
        Command::Check { file, submitter, signature, today, quota } => commands::check::run(
            &options,
            &CheckArgs {
                file,
                submitter,
                signature: signature.as_deref(),
                today: today.as_deref(),
                quota: quota.quota(),
            },
        ),
        Command::Apply {
            file,
            action,
            actor_id,
            actor_name,
            actor_role,
            signature,
            comments,
            reason,
            next,
            next_approver_id,
            at,
            output,
            quota,
        } => commands::apply::run(
            &options,
            &ApplyArgs {
                file,
                action,
                actor_id,
                actor_name: actor_name.as_deref(),
                actor_role,
                signature: signature.as_deref(),
                comments: comments.as_deref(),
                reason: reason.as_deref(),
                next: next.as_deref(),
                next_approver_id: next_approver_id.as_deref(),
                at: at.as_deref(),
                output: output.as_deref(),
                quota: quota.quota(),
            },
        ),
        Command::Migrate => commands::migrate::run(&options),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => {
            let doctor = commands::doctor::run(&options, *json);
            CommandResult { exit_code: if doctor.healthy { 0 } else { 1 }, output: doctor.rendered }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
