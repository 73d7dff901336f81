use std::env;
use std::sync::{Mutex, OnceLock};

use reco_cli::commands::{config, doctor, migrate, stats};
use serde_json::Value;

const VALID_TOKEN: &str = "123456:ABC-test";

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[("RECO_TELEGRAM_BOT_TOKEN", VALID_TOKEN), ("RECO_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
            assert_eq!(payload["message"], "schema up to date (1 migrations applied)");
        },
    );
}

#[test]
fn migrate_returns_config_failure_without_token() {
    with_env(&[("RECO_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_json_warns_on_fresh_database_without_owner() {
    with_env(
        &[("RECO_TELEGRAM_BOT_TOKEN", VALID_TOKEN), ("RECO_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 0, "warnings do not fail doctor");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "warn");
            let checks = payload["checks"].as_array().expect("checks array");
            let status_of = |name: &str| {
                checks
                    .iter()
                    .find(|check| check["name"] == name)
                    .map(|check| check["status"].clone())
                    .unwrap_or(Value::Null)
            };
            assert_eq!(status_of("config_validation"), "pass");
            assert_eq!(status_of("bot_token_shape"), "pass");
            assert_eq!(status_of("owner_chat_id"), "warn");
            assert_eq!(status_of("database_schema"), "warn");
        },
    );
}

#[test]
fn doctor_fails_and_skips_when_config_is_invalid() {
    with_env(&[("RECO_TELEGRAM_BOT_TOKEN", "not a token")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] database_schema"));
    });
}

#[test]
fn config_redacts_the_bot_secret_and_names_sources() {
    with_env(
        &[
            ("RECO_TELEGRAM_BOT_TOKEN", VALID_TOKEN),
            ("RECO_DATABASE_URL", "sqlite::memory:"),
            ("RECO_TELEGRAM_OWNER_CHAT_ID", "42"),
        ],
        || {
            let output = config::run();
            assert!(output.contains(
                "- telegram.bot_token = 123456:*** (source: env (RECO_TELEGRAM_BOT_TOKEN))"
            ));
            assert!(!output.contains("ABC-test"));
            assert!(output.contains(
                "- telegram.owner_chat_id = 42 (source: env (RECO_TELEGRAM_OWNER_CHAT_ID))"
            ));
            assert!(output.contains("- engagement.ask_every = 3 (source: default)"));
        },
    );
}

#[test]
fn stats_reports_query_failure_on_unmigrated_database() {
    with_env(
        &[("RECO_TELEGRAM_BOT_TOKEN", VALID_TOKEN), ("RECO_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = stats::run();
            assert_eq!(result.exit_code, 5);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "stats");
            assert_eq!(payload["error_class"], "query");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "RECO_DATABASE_URL",
        "RECO_DATABASE_MAX_CONNECTIONS",
        "RECO_DATABASE_TIMEOUT_SECS",
        "RECO_TELEGRAM_BOT_TOKEN",
        "RECO_TELEGRAM_API_BASE_URL",
        "RECO_TELEGRAM_OWNER_CHAT_ID",
        "RECO_TELEGRAM_POLL_TIMEOUT_SECS",
        "RECO_ENGAGEMENT_LOCAL_TZ",
        "RECO_ENGAGEMENT_PMF_DEBUG_ALWAYS",
        "RECO_ENGAGEMENT_ASK_EVERY",
        "RECO_ENGAGEMENT_FEEDBACK_WINDOW_SECS",
        "RECO_SERVER_BIND_ADDRESS",
        "RECO_SERVER_HEALTH_CHECK_PORT",
        "RECO_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "RECO_LOGGING_LEVEL",
        "RECO_LOGGING_FORMAT",
        "RECO_LOG_LEVEL",
        "RECO_LOG_FORMAT",
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
