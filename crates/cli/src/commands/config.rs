use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use travelink_core::config::{resolve_config_path, LoadOptions};

use crate::commands::{load_config, CommandResult};

struct ConfigSources {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl ConfigSources {
    fn detect(options: &LoadOptions) -> Self {
        let path = resolve_config_path(options.config_path.as_deref());
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn source(&self, key_path: &str, env_keys: &[&str], overridden: bool) -> String {
        if overridden {
            return "override".to_string();
        }

        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

/// Renders the effective configuration with the source of every value.
pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let sources = ConfigSources::detect(options);
    let overrides = &options.overrides;

    let mut lines = vec![
        "effective config (source precedence: override > env > file > default):".to_string(),
    ];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        sources.source(
            "database.url",
            &["TRAVELINK_DATABASE_URL"],
            overrides.database_url.is_some(),
        ),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        sources.source("database.max_connections", &["TRAVELINK_DATABASE_MAX_CONNECTIONS"], false),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        sources.source("database.timeout_secs", &["TRAVELINK_DATABASE_TIMEOUT_SECS"], false),
    ));

    lines.push(render_line(
        "workflow.min_comment_chars",
        &config.workflow.min_comment_chars.to_string(),
        sources.source(
            "workflow.min_comment_chars",
            &["TRAVELINK_WORKFLOW_MIN_COMMENT_CHARS"],
            overrides.min_comment_chars.is_some(),
        ),
    ));
    lines.push(render_line(
        "workflow.default_vp_requirement",
        config.workflow.default_vp_requirement.as_str(),
        sources.source(
            "workflow.default_vp_requirement",
            &["TRAVELINK_WORKFLOW_DEFAULT_VP_REQUIREMENT"],
            overrides.default_vp_requirement.is_some(),
        ),
    ));
    for (department_id, department) in &config.workflow.departments {
        let key = format!("workflow.departments.{department_id}.vp_requirement");
        let source = sources.source(&key, &[], false);
        lines.push(render_line(&key, department.vp_requirement.as_str(), source));
    }

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        sources.source(
            "logging.level",
            &["TRAVELINK_LOGGING_LEVEL", "TRAVELINK_LOG_LEVEL"],
            overrides.log_level.is_some(),
        ),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_ascii_lowercase(),
        sources.source(
            "logging.format",
            &["TRAVELINK_LOGGING_FORMAT", "TRAVELINK_LOG_FORMAT"],
            false,
        ),
    ));

    CommandResult::success("config", lines.join("\n"))
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_department_keys_are_found() {
        let doc: toml::Value = r#"
            [workflow.departments.dept-cs]
            vp_requirement = "dual"
        "#
        .parse()
        .expect("toml");

        assert!(contains_path(&doc, "workflow.departments.dept-cs.vp_requirement"));
        assert!(!contains_path(&doc, "workflow.departments.dept-math.vp_requirement"));
        assert!(!contains_path(&doc, "database.url"));
    }
}
