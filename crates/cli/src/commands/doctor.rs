use serde::Serialize;
use sqlx::Row;
use travelink_core::config::{AppConfig, LoadOptions};
use travelink_core::workflow::VpRequirement;
use travelink_db::{connect_with_config, migrations::MIGRATOR, ping, DbPool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

impl CheckStatus {
    fn marker(self) -> &'static str {
        match self {
            Self::Pass => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Skipped => "skip",
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub struct DoctorOutput {
    pub healthy: bool,
    pub rendered: String,
}

const DATABASE_CHECKS: [&str; 2] = ["database_connectivity", "schema_migrations"];

/// Readiness report. Warnings are reported but do not make the run unhealthy.
pub fn run(options: &LoadOptions, json_output: bool) -> DoctorOutput {
    let report = build_report(options);
    let healthy = report.overall_status != CheckStatus::Fail;

    let rendered = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    } else {
        let mut lines = vec![report.summary.clone()];
        lines.extend(report.checks.iter().map(|check| {
            format!("- [{}] {}: {}", check.status.marker(), check.name, check.details)
        }));
        lines.join("\n")
    };

    DoctorOutput { healthy, rendered }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let checks = match AppConfig::load(options.clone()) {
        Ok(config) => {
            let mut checks = vec![
                DoctorCheck::new(
                    "config_validation",
                    CheckStatus::Pass,
                    "configuration loaded and validated",
                ),
                department_policy_check(&config),
            ];
            checks.extend(database_checks(&config));
            checks
        }
        Err(error) => {
            let mut checks =
                vec![DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string())];
            checks.extend(["department_policy"].into_iter().chain(DATABASE_CHECKS).map(|name| {
                DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                )
            }));
            checks
        }
    };

    let overall_status = if checks.iter().any(|check| check.status == CheckStatus::Fail) {
        CheckStatus::Fail
    } else if checks.iter().any(|check| check.status == CheckStatus::Warn) {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };
    let summary = match overall_status {
        CheckStatus::Pass => "doctor: all readiness checks passed",
        CheckStatus::Warn => "doctor: ready, with warnings",
        _ => "doctor: one or more readiness checks failed",
    }
    .to_string();

    DoctorReport { overall_status, summary, checks }
}

fn department_policy_check(config: &AppConfig) -> DoctorCheck {
    let workflow = &config.workflow;
    let with_vp = workflow
        .departments
        .values()
        .filter(|department| department.vp_requirement != VpRequirement::None)
        .count();

    DoctorCheck::new(
        "department_policy",
        CheckStatus::Pass,
        format!(
            "default vp requirement `{}`, {} department override(s), {} requiring vp sign-off",
            workflow.default_vp_requirement.as_str(),
            workflow.departments.len(),
            with_vp
        ),
    )
}

fn database_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let [connectivity, schema] = DATABASE_CHECKS;
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::new(
                    connectivity,
                    CheckStatus::Fail,
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::new(schema, CheckStatus::Skipped, "no async runtime"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::new(
                        connectivity,
                        CheckStatus::Fail,
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::new(schema, CheckStatus::Skipped, "database unreachable"),
                ];
            }
        };

        let checks = match ping(&pool).await {
            Ok(()) => vec![
                DoctorCheck::new(
                    connectivity,
                    CheckStatus::Pass,
                    format!("connected using `{}`", config.database.url),
                ),
                schema_check(&pool).await,
            ],
            Err(error) => vec![
                DoctorCheck::new(
                    connectivity,
                    CheckStatus::Fail,
                    format!("database did not answer: {error}"),
                ),
                DoctorCheck::new(schema, CheckStatus::Skipped, "database unreachable"),
            ],
        };
        pool.close().await;
        checks
    })
}

async fn schema_check(pool: &DbPool) -> DoctorCheck {
    let expected = MIGRATOR.iter().filter(|migration| migration.migration_type.is_up_migration());
    let expected = expected.count() as i64;
    let applied = sqlx::query("SELECT COUNT(*) AS applied FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
        .and_then(|row| row.try_get::<i64, _>("applied"))
        .unwrap_or(0);

    if applied >= expected {
        DoctorCheck::new(
            DATABASE_CHECKS[1],
            CheckStatus::Pass,
            format!("{applied} of {expected} migration(s) applied"),
        )
    } else {
        DoctorCheck::new(
            DATABASE_CHECKS[1],
            CheckStatus::Warn,
            format!("{applied} of {expected} migration(s) applied; run `travelink migrate`"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{CheckStatus, DoctorCheck};

    #[test]
    fn markers_distinguish_every_status() {
        let markers: Vec<&str> =
            [CheckStatus::Pass, CheckStatus::Warn, CheckStatus::Fail, CheckStatus::Skipped]
                .into_iter()
                .map(CheckStatus::marker)
                .collect();
        assert_eq!(markers, vec!["ok", "warn", "fail", "skip"]);
    }

    #[test]
    fn checks_serialize_status_in_snake_case() {
        let check = DoctorCheck::new("schema_migrations", CheckStatus::Warn, "0 of 1");
        let json = serde_json::to_value(&check).expect("serialize check");
        assert_eq!(json["status"], "warn");
    }
}
