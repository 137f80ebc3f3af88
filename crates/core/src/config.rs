use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::policy::{StaticDepartmentPolicy, VpRequirement};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub min_comment_chars: usize,
    pub default_vp_requirement: VpRequirement,
    pub departments: BTreeMap<String, DepartmentConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentConfig {
    pub vp_requirement: VpRequirement,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub min_comment_chars: Option<usize>,
    pub default_vp_requirement: Option<VpRequirement>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_MIN_COMMENT_CHARS: usize = 10;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://travelink.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            workflow: WorkflowConfig {
                min_comment_chars: DEFAULT_MIN_COMMENT_CHARS,
                default_vp_requirement: VpRequirement::None,
                departments: BTreeMap::new(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("travelink.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// VP sign-off lookup backed by the `[workflow]` section.
    pub fn department_policy(&self) -> StaticDepartmentPolicy {
        let mut policy = StaticDepartmentPolicy::new(self.workflow.default_vp_requirement);
        for (department_id, department) in &self.workflow.departments {
            policy = policy.with_department(department_id.clone(), department.vp_requirement);
        }
        policy
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(min_comment_chars) = workflow.min_comment_chars {
                self.workflow.min_comment_chars = min_comment_chars;
            }
            if let Some(default_vp_requirement) = workflow.default_vp_requirement {
                self.workflow.default_vp_requirement = default_vp_requirement;
            }
            self.workflow.departments.extend(workflow.departments);
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TRAVELINK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(max_connections) = env_parsed("TRAVELINK_DATABASE_MAX_CONNECTIONS")? {
            self.database.max_connections = max_connections;
        }
        if let Some(timeout_secs) = env_parsed("TRAVELINK_DATABASE_TIMEOUT_SECS")? {
            self.database.timeout_secs = timeout_secs;
        }
        if let Some(min_comment_chars) = env_parsed("TRAVELINK_WORKFLOW_MIN_COMMENT_CHARS")? {
            self.workflow.min_comment_chars = min_comment_chars;
        }
        if let Some(requirement) = env_parsed("TRAVELINK_WORKFLOW_DEFAULT_VP_REQUIREMENT")? {
            self.workflow.default_vp_requirement = requirement;
        }

        if let Some(level) = read_env_alias("TRAVELINK_LOGGING_LEVEL", "TRAVELINK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = read_env_alias("TRAVELINK_LOGGING_FORMAT", "TRAVELINK_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(min_comment_chars) = overrides.min_comment_chars {
            self.workflow.min_comment_chars = min_comment_chars;
        }
        if let Some(default_vp_requirement) = overrides.default_vp_requirement {
            self.workflow.default_vp_requirement = default_vp_requirement;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_workflow(&self.workflow)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The file `AppConfig::load` would read: an explicit path when it exists,
/// otherwise the first default location present.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("travelink.toml"), PathBuf::from("config/travelink.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${VAR}` and `${VAR:-fallback}` references in raw TOML.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("${") {
        output.push_str(&rest[..open]);
        let expression = &rest[open + 2..];
        let close = expression.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let (name, fallback) = match expression[..close].split_once(":-") {
            Some((name, fallback)) => (name.trim(), Some(fallback)),
            None => (expression[..close].trim(), None),
        };

        match (env::var(name), fallback) {
            (Ok(value), _) => output.push_str(&value),
            (Err(_), Some(fallback)) => output.push_str(fallback),
            (Err(_), None) => {
                return Err(ConfigError::MissingEnvInterpolation { var: name.to_string() });
            }
        }
        rest = &expression[close + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    if !["sqlite://", "sqlite::"].iter().any(|prefix| url.starts_with(prefix)) && url != ":memory:"
    {
        return Err(ConfigError::Validation(format!(
            "database.url `{url}` is not a sqlite URL (use `sqlite://path`, `sqlite::memory:` \
             or `:memory:`)"
        )));
    }
    if database.max_connections == 0 {
        return Err(ConfigError::Validation("database.max_connections must be at least 1".into()));
    }
    if !(1..=300).contains(&database.timeout_secs) {
        return Err(ConfigError::Validation(format!(
            "database.timeout_secs must be within 1..=300, got {}",
            database.timeout_secs
        )));
    }
    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if !(DEFAULT_MIN_COMMENT_CHARS..=2000).contains(&workflow.min_comment_chars) {
        return Err(ConfigError::Validation(format!(
            "workflow.min_comment_chars must be in range {DEFAULT_MIN_COMMENT_CHARS}..=2000"
        )));
    }

    if let Some(blank) = workflow.departments.keys().find(|id| id.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "workflow.departments contains a blank department id `{blank}`"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if LEVELS.contains(&logging.level.trim().to_ascii_lowercase().as_str()) {
        return Ok(());
    }
    Err(ConfigError::Validation(format!(
        "logging.level `{}` must be one of {}",
        logging.level,
        LEVELS.join("|")
    )))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_alias(key: &str, alias: &str) -> Option<String> {
    read_env(key).or_else(|| read_env(alias))
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    let Some(value) = read_env(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    workflow: Option<WorkflowPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    min_comment_chars: Option<usize>,
    default_vp_requirement: Option<VpRequirement>,
    #[serde(default)]
    departments: BTreeMap<String, DepartmentConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
