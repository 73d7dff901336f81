use chrono::{Duration, Utc};
use reco_core::insights::{UsageStats, STATS_WINDOW_DAYS};
use reco_db::{connect_with_settings, EventRepository, RecordRepository, SqlEventRepository, SqlRecordRepository};

use crate::commands::{block_on, load_config, CommandResult};

/// Same counters as the in-chat `/stats`, computed against the configured
/// database with the owner excluded.
pub fn run() -> CommandResult {
    let config = match load_config("stats") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let result = block_on("stats", async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let now = Utc::now();
        let owner = config.telegram.owner_chat_id.map(reco_core::domain::record::UserId);
        let records = SqlRecordRepository::new(pool.clone());
        let events = SqlEventRepository::new(pool.clone());

        let total = records.count_all(owner).await.map_err(|error| ("query", error.to_string(), 5u8))?;
        let window = events
            .events_since(now - Duration::days(STATS_WINDOW_DAYS), owner)
            .await
            .map_err(|error| ("query", error.to_string(), 5u8))?;
        pool.close().await;

        Ok::<UsageStats, (&'static str, String, u8)>(UsageStats::compute(
            total,
            &window,
            now,
            config.engagement.local_tz,
        ))
    });

    match result {
        Ok(Ok(stats)) => CommandResult::success("stats", summarize(&stats)),
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("stats", error_class, message, exit_code)
        }
        Err(failure) => failure,
    }
}

fn summarize(stats: &UsageStats) -> String {
    format!(
        "records={} users_12m={} new_7d={} active_7d={} unrecognized_30d={}/{} retained_7d={}/{}",
        stats.total_records,
        stats.unique_users,
        stats.new_users_7d,
        stats.active_users_7d,
        stats.unrecognized_30d,
        stats.tracked_30d,
        stats.retained_7d,
        stats.cohort_30d,
    )
}

#[cfg(test)]
mod tests {
    use reco_core::insights::UsageStats;

    use super::summarize;

    #[test]
    fn summary_is_one_key_value_line() {
        let stats = UsageStats {
            total_records: 12,
            unique_users: 3,
            new_users_7d: 1,
            active_users_7d: 2,
            unrecognized_30d: 4,
            tracked_30d: 40,
            retained_7d: 1,
            cohort_30d: 2,
        };
        assert_eq!(
            summarize(&stats),
            "records=12 users_12m=3 new_7d=1 active_7d=2 unrecognized_30d=4/40 retained_7d=1/2"
        );
    }
}
