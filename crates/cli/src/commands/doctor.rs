use reco_core::config::{is_valid_bot_token_shape, AppConfig, LoadOptions};
use reco_db::{connect_with_settings, migrations};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code 0 when nothing failed (warnings allowed), 1 otherwise.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_bot_token(&config));
            checks.push(check_owner(&config));
            checks.push(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["bot_token_shape", "owner_chat_id", "database_schema"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (failed, warned) {
        (true, _) => (CheckStatus::Fail, "doctor: one or more readiness checks failed"),
        (false, true) => (CheckStatus::Warn, "doctor: ready, with warnings"),
        (false, false) => (CheckStatus::Pass, "doctor: all readiness checks passed"),
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_bot_token(config: &AppConfig) -> DoctorCheck {
    let token = config.telegram.bot_token.expose_secret();
    if is_valid_bot_token_shape(token) {
        let bot_id = token.split_once(':').map(|(id, _)| id).unwrap_or_default();
        DoctorCheck {
            name: "bot_token_shape",
            status: CheckStatus::Pass,
            details: format!("token for bot id {bot_id} has the expected shape"),
        }
    } else {
        DoctorCheck {
            name: "bot_token_shape",
            status: CheckStatus::Fail,
            details: "token must look like `<bot id>:<secret>`".to_string(),
        }
    }
}

fn check_owner(config: &AppConfig) -> DoctorCheck {
    match config.telegram.owner_chat_id {
        Some(owner) => DoctorCheck {
            name: "owner_chat_id",
            status: CheckStatus::Pass,
            details: format!("admin commands and feedback go to chat {owner}"),
        },
        None => DoctorCheck {
            name: "owner_chat_id",
            status: CheckStatus::Warn,
            details: "no owner configured: feedback is stored but not forwarded, admin commands are off"
                .to_string(),
        },
    }
}

/// Connects and compares applied migrations with the embedded ones. Never
/// migrates; that is what `reco migrate` is for.
fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_schema",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let applied = migrations::applied_versions(&pool).await.unwrap_or_default();
        pool.close().await;
        Ok::<Vec<i64>, String>(applied)
    });

    let latest = migrations::latest_version();
    match result {
        Ok(applied) if applied.last().copied() == latest => DoctorCheck {
            name: "database_schema",
            status: CheckStatus::Pass,
            details: format!("connected; schema at version {}", latest.unwrap_or_default()),
        },
        Ok(applied) => DoctorCheck {
            name: "database_schema",
            status: CheckStatus::Warn,
            details: format!(
                "connected; {} of {} migrations applied, run `reco migrate`",
                applied.len(),
                migrations::MIGRATOR
                    .iter()
                    .filter(|migration| !migration.migration_type.is_down_migration())
                    .count()
            ),
        },
        Err(error) => {
            DoctorCheck { name: "database_schema", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
