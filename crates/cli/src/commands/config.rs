use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use reco_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

/// One printable config field: dotted path, primary env key, rendered value.
struct Field {
    path: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.path,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.path, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let field = |path, env_key, value: String| Field { path, env_key, value };
    vec![
        field("database.url", "RECO_DATABASE_URL", config.database.url.clone()),
        field(
            "database.max_connections",
            "RECO_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "RECO_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field(
            "telegram.bot_token",
            "RECO_TELEGRAM_BOT_TOKEN",
            redact_token(config.telegram.bot_token.expose_secret()),
        ),
        field(
            "telegram.api_base_url",
            "RECO_TELEGRAM_API_BASE_URL",
            config.telegram.api_base_url.clone(),
        ),
        field(
            "telegram.owner_chat_id",
            "RECO_TELEGRAM_OWNER_CHAT_ID",
            config
                .telegram
                .owner_chat_id
                .map(|owner| owner.to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        field(
            "telegram.poll_timeout_secs",
            "RECO_TELEGRAM_POLL_TIMEOUT_SECS",
            config.telegram.poll_timeout_secs.to_string(),
        ),
        field(
            "engagement.local_tz",
            "RECO_ENGAGEMENT_LOCAL_TZ",
            config.engagement.local_tz.name().to_string(),
        ),
        field(
            "engagement.pmf_debug_always",
            "RECO_ENGAGEMENT_PMF_DEBUG_ALWAYS",
            config.engagement.pmf_debug_always.to_string(),
        ),
        field(
            "engagement.ask_every",
            "RECO_ENGAGEMENT_ASK_EVERY",
            config.engagement.ask_every.to_string(),
        ),
        field(
            "engagement.feedback_window_secs",
            "RECO_ENGAGEMENT_FEEDBACK_WINDOW_SECS",
            config.engagement.feedback_window_secs.to_string(),
        ),
        field("server.bind_address", "RECO_SERVER_BIND_ADDRESS", config.server.bind_address.clone()),
        field(
            "server.health_check_port",
            "RECO_SERVER_HEALTH_CHECK_PORT",
            config.server.health_check_port.to_string(),
        ),
        field(
            "server.graceful_shutdown_secs",
            "RECO_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field("logging.level", "RECO_LOGGING_LEVEL", config.logging.level.clone()),
        field("logging.format", "RECO_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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

/// Keeps the public bot id and hides the secret half.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn tokens_keep_only_the_bot_id() {
        assert_eq!(redact_token("123456:AAE-secret"), "123456:***");
        assert_eq!(redact_token("   "), "<empty>");
        assert_eq!(redact_token("garbage"), "<redacted>");
    }

    #[test]
    fn dotted_paths_walk_nested_tables() {
        let doc: toml::Value = "[telegram]\nowner_chat_id = 5\n".parse().expect("toml");
        assert!(contains_path(&doc, "telegram.owner_chat_id"));
        assert!(!contains_path(&doc, "telegram.bot_token"));
        assert!(!contains_path(&doc, "server.bind_address"));
    }
}
