use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dermadesk_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

const SEARCHED_PATHS: [&str; 2] = ["dermadesk.toml", "config/dermadesk.toml"];

/// One reported setting: dotted key, display value, and the env vars that can set it.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return CommandResult::from_failure("config", failure),
    };

    let config_file_path = detect_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = match &config.llm.api_key {
        Some(key) => redact_key(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["DERMADESK_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["DERMADESK_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["DERMADESK_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "llm.provider",
            value: format!("{:?}", config.llm.provider),
            env_keys: &["DERMADESK_LLM_PROVIDER"],
        },
        Field {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["DERMADESK_LLM_MODEL"],
        },
        Field {
            key: "llm.base_url",
            value: config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["DERMADESK_LLM_BASE_URL"],
        },
        Field { key: "llm.api_key", value: api_key, env_keys: &["DERMADESK_LLM_API_KEY"] },
        Field {
            key: "llm.temperature",
            value: config.llm.temperature.to_string(),
            env_keys: &["DERMADESK_LLM_TEMPERATURE"],
        },
        Field {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["DERMADESK_LLM_TIMEOUT_SECS"],
        },
        Field {
            key: "agent.max_reprompts",
            value: config.agent.max_reprompts.to_string(),
            env_keys: &["DERMADESK_AGENT_MAX_REPROMPTS"],
        },
        Field {
            key: "agent.max_steps_per_turn",
            value: config.agent.max_steps_per_turn.to_string(),
            env_keys: &["DERMADESK_AGENT_MAX_STEPS_PER_TURN"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["DERMADESK_LOGGING_LEVEL", "DERMADESK_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["DERMADESK_LOGGING_FORMAT", "DERMADESK_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then_some(path);
    }
    SEARCHED_PATHS.iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
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

/// Keeps a recognisable prefix such as `sk-` and hides the rest.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
