use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "reco.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub engagement: EngagementConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    /// Receives forwarded feedback and may run the admin commands.
    pub owner_chat_id: Option<i64>,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EngagementConfig {
    pub local_tz: Tz,
    pub pmf_debug_always: bool,
    pub ask_every: u32,
    pub feedback_window_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
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
    pub bot_token: Option<String>,
    pub owner_chat_id: Option<i64>,
    pub pmf_debug_always: Option<bool>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://reco.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                owner_chat_id: None,
                poll_timeout_secs: 30,
            },
            engagement: EngagementConfig {
                local_tz: chrono_tz::Europe::Madrid,
                pmf_debug_always: false,
                ask_every: 3,
                feedback_window_secs: 300,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
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
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Owner check for the admin-only commands. With no owner configured,
    /// nobody is the owner.
    pub fn is_owner(&self, user_id: i64) -> bool {
        self.telegram.owner_chat_id == Some(user_id)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
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

        if let Some(telegram) = patch.telegram {
            if let Some(token) = telegram.bot_token {
                self.telegram.bot_token = token.into();
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(owner_chat_id) = telegram.owner_chat_id {
                self.telegram.owner_chat_id = owner_from_raw(owner_chat_id);
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(engagement) = patch.engagement {
            if let Some(local_tz) = engagement.local_tz {
                self.engagement.local_tz = parse_tz("engagement.local_tz", &local_tz)?;
            }
            if let Some(pmf_debug_always) = engagement.pmf_debug_always {
                self.engagement.pmf_debug_always = pmf_debug_always;
            }
            if let Some(ask_every) = engagement.ask_every {
                self.engagement.ask_every = ask_every;
            }
            if let Some(feedback_window_secs) = engagement.feedback_window_secs {
                self.engagement.feedback_window_secs = feedback_window_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RECO_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("RECO_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("RECO_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("RECO_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("RECO_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RECO_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = value.into();
        }
        if let Some(value) = read_env("RECO_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("RECO_TELEGRAM_OWNER_CHAT_ID") {
            let raw = parse_i64("RECO_TELEGRAM_OWNER_CHAT_ID", &value)?;
            self.telegram.owner_chat_id = owner_from_raw(raw);
        }
        if let Some(value) = read_env("RECO_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs = parse_u64("RECO_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RECO_ENGAGEMENT_LOCAL_TZ") {
            self.engagement.local_tz = parse_tz("RECO_ENGAGEMENT_LOCAL_TZ", &value)?;
        }
        if let Some(value) = read_env("RECO_ENGAGEMENT_PMF_DEBUG_ALWAYS") {
            self.engagement.pmf_debug_always =
                parse_flag("RECO_ENGAGEMENT_PMF_DEBUG_ALWAYS", &value)?;
        }
        if let Some(value) = read_env("RECO_ENGAGEMENT_ASK_EVERY") {
            self.engagement.ask_every = parse_u32("RECO_ENGAGEMENT_ASK_EVERY", &value)?;
        }
        if let Some(value) = read_env("RECO_ENGAGEMENT_FEEDBACK_WINDOW_SECS") {
            self.engagement.feedback_window_secs =
                parse_u64("RECO_ENGAGEMENT_FEEDBACK_WINDOW_SECS", &value)?;
        }

        if let Some(value) = read_env("RECO_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RECO_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("RECO_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("RECO_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("RECO_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("RECO_LOGGING_LEVEL").or_else(|| read_env("RECO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("RECO_LOGGING_FORMAT").or_else(|| read_env("RECO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
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
        if let Some(bot_token) = overrides.bot_token {
            self.telegram.bot_token = bot_token.into();
        }
        if let Some(owner_chat_id) = overrides.owner_chat_id {
            self.telegram.owner_chat_id = owner_from_raw(owner_chat_id);
        }
        if let Some(pmf_debug_always) = overrides.pmf_debug_always {
            self.engagement.pmf_debug_always = pmf_debug_always;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telegram(&self.telegram)?;
        validate_engagement(&self.engagement)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// `<numeric bot id>:<secret>`, the shape BotFather hands out.
pub fn is_valid_bot_token_shape(token: &str) -> bool {
    let Some((bot_id, secret)) = token.split_once(':') else {
        return false;
    };
    !bot_id.is_empty()
        && bot_id.chars().all(|ch| ch.is_ascii_digit())
        && !secret.is_empty()
        && !secret.chars().any(char::is_whitespace)
}

fn owner_from_raw(raw: i64) -> Option<i64> {
    (raw != 0).then_some(raw)
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
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

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let token = telegram.bot_token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Create a bot with @BotFather and copy its token"
                .to_string(),
        ));
    }
    if !is_valid_bot_token_shape(token) {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    let base_url = telegram.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "telegram.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    // Telegram caps long polling at 50 seconds.
    if telegram.poll_timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 0..=50".to_string(),
        ));
    }

    Ok(())
}

fn validate_engagement(engagement: &EngagementConfig) -> Result<(), ConfigError> {
    if engagement.ask_every == 0 {
        return Err(ConfigError::Validation(
            "engagement.ask_every must be greater than zero".to_string(),
        ));
    }
    if engagement.feedback_window_secs == 0 {
        return Err(ConfigError::Validation(
            "engagement.feedback_window_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse::<i64>().map_err(|_| invalid_override(key, value))
}

/// Accepts `1`/`0` as well as `true`/`false`.
fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(invalid_override(key, value)),
    }
}

fn parse_tz(key: &str, value: &str) -> Result<Tz, ConfigError> {
    value.trim().parse::<Tz>().map_err(|_| {
        ConfigError::Validation(format!("{key} `{value}` is not an IANA time zone name"))
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    engagement: Option<EngagementPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    owner_chat_id: Option<i64>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EngagementPatch {
    local_tz: Option<String>,
    pmf_debug_always: Option<bool>,
    ask_every: Option<u32>,
    feedback_window_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        is_valid_bot_token_shape, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const TOKEN: &str = "123456:ABC-token";

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_RECO_BOT_TOKEN", "987:from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("reco.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "${TEST_RECO_BOT_TOKEN}"
owner_chat_id = 42

[engagement]
local_tz = "America/Mexico_City"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "987:from-env",
                "bot token should be interpolated from the environment",
            )?;
            ensure(config.is_owner(42), "owner chat id should come from the file")?;
            ensure(
                config.engagement.local_tz == chrono_tz::America::Mexico_City,
                "time zone should be parsed from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_RECO_BOT_TOKEN"]);
        result
    }

    #[test]
    fn logging_and_engagement_env_overrides_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RECO_TELEGRAM_BOT_TOKEN", TOKEN);
        env::set_var("RECO_LOG_LEVEL", "warn");
        env::set_var("RECO_LOG_FORMAT", "json");
        env::set_var("RECO_ENGAGEMENT_PMF_DEBUG_ALWAYS", "1");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            ensure(config.engagement.pmf_debug_always, "`1` should enable pmf debug mode")?;
            ensure(config.engagement.ask_every == 3, "ask_every keeps its default")?;
            Ok(())
        })();

        clear_vars(&[
            "RECO_TELEGRAM_BOT_TOKEN",
            "RECO_LOG_LEVEL",
            "RECO_LOG_FORMAT",
            "RECO_ENGAGEMENT_PMF_DEBUG_ALWAYS",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RECO_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("RECO_TELEGRAM_BOT_TOKEN", "111:from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("reco.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[telegram]
bot_token = "222:from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    owner_chat_id: Some(7),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.telegram.bot_token.expose_secret() == "111:from-env",
                "env bot token should win over file and defaults",
            )?;
            ensure(config.is_owner(7), "override owner should win")?;
            Ok(())
        })();

        clear_vars(&["RECO_DATABASE_URL", "RECO_TELEGRAM_BOT_TOKEN"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RECO_TELEGRAM_BOT_TOKEN", "not-a-token");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("telegram.bot_token")
            );
            ensure(has_message, "validation failure should mention telegram.bot_token")
        })();

        clear_vars(&["RECO_TELEGRAM_BOT_TOKEN"]);
        result
    }

    #[test]
    fn unknown_time_zone_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RECO_TELEGRAM_BOT_TOKEN", TOKEN);
        env::set_var("RECO_ENGAGEMENT_LOCAL_TZ", "Mars/Olympus");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected time zone validation failure".to_string()),
            Err(ConfigError::Validation(message)) if message.contains("Mars/Olympus") => Ok(()),
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&["RECO_TELEGRAM_BOT_TOKEN", "RECO_ENGAGEMENT_LOCAL_TZ"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RECO_TELEGRAM_BOT_TOKEN", "555:secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("secret-value"), "debug output should not contain bot token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            ensure(!config.is_owner(0), "no owner is configured by default")?;
            Ok(())
        })();

        clear_vars(&["RECO_TELEGRAM_BOT_TOKEN"]);
        result
    }

    #[test]
    fn bot_token_shape() {
        assert!(is_valid_bot_token_shape("123456:AAE-abc_def"));
        assert!(!is_valid_bot_token_shape("abc:def"));
        assert!(!is_valid_bot_token_shape("123456:"));
        assert!(!is_valid_bot_token_shape("123456"));
    }
}
