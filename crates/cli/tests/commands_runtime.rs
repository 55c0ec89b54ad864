use std::env;
use std::sync::{Mutex, OnceLock};

use dermadesk_cli::commands::{cancel, config, migrate, seed};
use dermadesk_core::config::LoadOptions;
use serde_json::Value;

const IN_MEMORY_STORE: [(&str, &str); 2] =
    [("DERMADESK_DATABASE_URL", "sqlite::memory:"), ("DERMADESK_DATABASE_MAX_CONNECTIONS", "1")];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&IN_MEMORY_STORE, || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "applied pending migrations");
    });
}

#[test]
fn migrate_rejects_non_sqlite_urls() {
    with_env(&[("DERMADESK_DATABASE_URL", "postgres://localhost/dermadesk")], || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_reports_the_catalog_it_loaded() {
    with_env(&IN_MEMORY_STORE, || {
        let result = seed::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().expect("seed message");
        assert!(message.starts_with("catalog seed loaded: "), "{message}");
        assert!(message.ends_with("carts and sessions cleared"), "{message}");
    });
}

#[test]
fn seed_output_is_stable_across_runs() {
    with_env(&IN_MEMORY_STORE, || {
        let first = seed::run(LoadOptions::default());
        let second = seed::run(LoadOptions::default());

        assert_eq!(first.exit_code, 0);
        assert_eq!(second.exit_code, 0);
        assert_eq!(first.output, second.output, "seed summary should be deterministic");
    });
}

#[test]
fn config_reports_env_sources_and_redacts_api_key() {
    with_env(
        &[
            ("DERMADESK_DATABASE_URL", "sqlite://from-env.db"),
            ("DERMADESK_LLM_PROVIDER", "openai"),
            ("DERMADESK_LLM_API_KEY", "sk-live-secret"),
        ],
        || {
            let result = config::run(LoadOptions::default());
            assert_eq!(result.exit_code, 0, "expected config command success");

            let output = result.output;
            assert!(output.contains(
                "- database.url = sqlite://from-env.db (source: env (DERMADESK_DATABASE_URL))"
            ));
            assert!(output.contains("- llm.api_key = sk-*** (source: env (DERMADESK_LLM_API_KEY))"));
            assert!(output.contains("- agent.max_reprompts = 3 (source: default)"));
            assert!(!output.contains("live-secret"), "api key must never be printed");
        },
    );
}

#[test]
fn config_rejects_unparseable_env_values() {
    with_env(&[("DERMADESK_AGENT_MAX_REPROMPTS", "many")], || {
        let result = config::run(LoadOptions::default());
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn cancel_of_unknown_session_is_not_an_error() {
    with_env(&IN_MEMORY_STORE, || {
        let result = cancel::run(LoadOptions::default(), "session-nobody");
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "cancel");
        assert_eq!(payload["message"], "no saved session session-nobody");
    });
}

#[test]
fn cancel_rejects_blank_session_ids() {
    with_env(&IN_MEMORY_STORE, || {
        let result = cancel::run(LoadOptions::default(), "   ");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_session");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DERMADESK_DATABASE_URL",
        "DERMADESK_DATABASE_MAX_CONNECTIONS",
        "DERMADESK_DATABASE_TIMEOUT_SECS",
        "DERMADESK_LLM_PROVIDER",
        "DERMADESK_LLM_API_KEY",
        "DERMADESK_LLM_BASE_URL",
        "DERMADESK_LLM_MODEL",
        "DERMADESK_LLM_TEMPERATURE",
        "DERMADESK_LLM_TIMEOUT_SECS",
        "DERMADESK_AGENT_MAX_REPROMPTS",
        "DERMADESK_AGENT_MAX_STEPS_PER_TURN",
        "DERMADESK_LOGGING_LEVEL",
        "DERMADESK_LOGGING_FORMAT",
        "DERMADESK_LOG_LEVEL",
        "DERMADESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
