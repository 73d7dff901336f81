//! Owner reports: `/stats`, `/pmf` and `/top`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::domain::event::{Event, EventKind};
use crate::domain::feedback::PmfScore;
use crate::domain::record::UserId;
use crate::errors::DomainError;
use crate::text::escape_html;

pub const STATS_WINDOW_DAYS: i64 = 365;
pub const TOP_LIMIT: usize = 10;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub total_records: u64,
    pub unique_users: usize,
    pub new_users_7d: usize,
    pub active_users_7d: usize,
    pub unrecognized_30d: usize,
    pub tracked_30d: usize,
    pub retained_7d: usize,
    pub cohort_30d: usize,
}

impl UsageStats {
    /// `events` is the last 365 days of events with the owner already excluded.
    pub fn compute(total_records: u64, events: &[Event], now: DateTime<Utc>, tz: Tz) -> Self {
        let seven_days_ago = now - Duration::days(7);
        let thirty_days_ago = now - Duration::days(30);

        let mut first_seen: HashMap<UserId, DateTime<Utc>> = HashMap::new();
        for event in events {
            first_seen
                .entry(event.user_id)
                .and_modify(|seen| *seen = (*seen).min(event.created_at))
                .or_insert(event.created_at);
        }

        let active_users_7d = events
            .iter()
            .filter(|event| event.created_at >= seven_days_ago)
            .map(|event| event.user_id)
            .collect::<HashSet<_>>()
            .len();

        let tracked: Vec<&Event> = events
            .iter()
            .filter(|event| event.created_at >= thirty_days_ago)
            .filter(|event| EventKind::TRACKED_COMMANDS.contains(&event.kind))
            .collect();
        let unrecognized_30d =
            tracked.iter().filter(|event| event.kind == EventKind::Unrecognized).count();

        let mut first_week_days: HashMap<UserId, HashSet<NaiveDate>> = HashMap::new();
        for event in events {
            let Some(start) = first_seen.get(&event.user_id) else {
                continue;
            };
            if event.created_at - *start < Duration::days(7) {
                first_week_days
                    .entry(event.user_id)
                    .or_default()
                    .insert(event.created_at.with_timezone(&tz).date_naive());
            }
        }

        let cohort: Vec<UserId> = first_seen
            .iter()
            .filter(|(_, start)| **start >= thirty_days_ago)
            .map(|(user_id, _)| *user_id)
            .collect();
        let retained_7d = cohort
            .iter()
            .filter(|user_id| first_week_days.get(user_id).is_some_and(|days| days.len() >= 2))
            .count();

        Self {
            total_records,
            unique_users: first_seen.len(),
            new_users_7d: first_seen.values().filter(|start| **start >= seven_days_ago).count(),
            active_users_7d,
            unrecognized_30d,
            tracked_30d: tracked.len(),
            retained_7d,
            cohort_30d: cohort.len(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "📊 <b>Estadísticas Reco</b>\n\n\
             • Recordatorios guardados: <b>{}</b>\n\
             • Usuarios únicos (12 meses): <b>{}</b>\n\
             • <u>Nuevos últimos 7 días</u>: <b>{}</b>\n\
             • Activos últimos 7 días: <b>{}</b>\n\
             • Fallos de formato (30d): <b>{}</b>  ({}/{})\n\
             • Retención 7d (cohorte 30d): <b>{}</b>  ({}/{})",
            self.total_records,
            self.unique_users,
            self.new_users_7d,
            self.active_users_7d,
            percent(self.unrecognized_30d as u64, self.tracked_30d as u64),
            self.unrecognized_30d,
            self.tracked_30d,
            percent(self.retained_7d as u64, self.cohort_30d as u64),
            self.retained_7d,
            self.cohort_30d,
        )
    }
}

/// One decimal, `0.0%` for an empty denominator.
pub fn percent(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0.0%".to_owned();
    }
    format!("{:.1}%", part as f64 * 100.0 / whole as f64)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PmfDistribution {
    counts: [u64; 5],
}

impl PmfDistribution {
    pub fn from_scores(scores: &[PmfScore]) -> Self {
        let mut counts = [0u64; 5];
        for score in scores {
            let index = usize::from(score.value() - PmfScore::MIN);
            if let Some(slot) = counts.get_mut(index) {
                *slot += 1;
            }
        }
        Self { counts }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn count(&self, score: u8) -> u64 {
        score
            .checked_sub(PmfScore::MIN)
            .and_then(|index| self.counts.get(usize::from(index)))
            .copied()
            .unwrap_or(0)
    }

    pub fn strong(&self) -> u64 {
        self.count(4) + self.count(5)
    }

    pub fn render(&self) -> String {
        let total = self.total();
        if total == 0 {
            return "📭 Aún no hay respuestas PMF.".to_owned();
        }

        let lines = (PmfScore::MIN..=PmfScore::MAX)
            .map(|score| {
                let count = self.count(score);
                format!("{score}: {count} ({})", percent(count, total))
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "📊 <b>Resultados PMF</b>\n\n{lines}\n\nTotal: {total}\nUsuarios que sufrirían (4-5): {} ({})",
            self.strong(),
            percent(self.strong(), total)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopArgs {
    Range(ReportRange),
    Usage,
    Invalid(DomainError),
}

/// Monday-start week in `tz`; `offset` 0 is the current week, -1 the previous.
pub fn week_range(now: DateTime<Utc>, offset: i64, tz: Tz) -> ReportRange {
    let today = now.with_timezone(&tz).date_naive();
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
        + Duration::weeks(offset);
    let next_monday = monday + Duration::days(7);

    ReportRange {
        since: local_midnight(monday, tz),
        until: local_midnight(next_monday, tz),
        label: format!("{} → {}", monday.format("%Y-%m-%d"), next_monday.format("%Y-%m-%d")),
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Arguments of `/top`: nothing, a week offset, or `YYYY-MM-DD YYYY-MM-DD`.
pub fn parse_top_args(raw: &str, now: DateTime<Utc>, tz: Tz) -> TopArgs {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    match parts.as_slice() {
        [] => TopArgs::Range(week_range(now, 0, tz)),
        [offset] if is_signed_integer(offset) => match offset.parse::<i64>() {
            Ok(offset) if offset.abs() <= 520 => TopArgs::Range(week_range(now, offset, tz)),
            _ => TopArgs::Invalid(DomainError::InvalidDateRange(format!(
                "week offset `{offset}` is out of range"
            ))),
        },
        [start, end] if is_ymd(start) && is_ymd(end) => custom_range(start, end),
        _ => TopArgs::Usage,
    }
}

fn custom_range(start: &str, end: &str) -> TopArgs {
    let parse = |raw: &str| NaiveDate::parse_from_str(raw, "%Y-%m-%d");
    let (Ok(start_date), Ok(end_date)) = (parse(start), parse(end)) else {
        return TopArgs::Invalid(DomainError::InvalidDateRange(format!(
            "`{start} {end}` is not a pair of calendar dates"
        )));
    };
    if end_date <= start_date {
        return TopArgs::Invalid(DomainError::InvalidDateRange(
            "end date must be after start date".to_owned(),
        ));
    }

    TopArgs::Range(ReportRange {
        since: Utc.from_utc_datetime(&start_date.and_time(NaiveTime::MIN)),
        until: Utc.from_utc_datetime(&end_date.and_time(NaiveTime::MIN)),
        label: format!("{start} → {end}"),
    })
}

fn is_signed_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit())
}

fn is_ymd(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

pub fn top_usage() -> &'static str {
    "Uso:\n\
     • /top              → semana actual\n\
     • /top -1           → semana pasada\n\
     • /top -2           → hace dos semanas\n\
     • /top 2025-09-01 2025-09-07  → rango personalizado"
}

pub fn top_invalid_range() -> &'static str {
    "Formato inválido. Usa: /top YYYY-MM-DD YYYY-MM-DD (fin > inicio)."
}

/// Most frequent `meta.key_norm` values, count descending then key ascending.
pub fn tally_keys(events: &[Event], limit: usize) -> Vec<(String, u64)> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for key in events.iter().filter_map(Event::key_norm) {
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, u64)> =
        counts.into_iter().map(|(key, count)| (key.to_owned(), count)).collect();
    ranked.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
    ranked.truncate(limit);
    ranked
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopReport {
    pub label: String,
    pub total_saves: usize,
    pub total_queries: usize,
    pub top_saves: Vec<(String, u64)>,
    pub top_queries: Vec<(String, u64)>,
}

impl TopReport {
    pub fn build(range: &ReportRange, saves: &[Event], queries: &[Event]) -> Self {
        Self {
            label: range.label.clone(),
            total_saves: saves.len(),
            total_queries: queries.len(),
            top_saves: tally_keys(saves, TOP_LIMIT),
            top_queries: tally_keys(queries, TOP_LIMIT),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "📌 <b>Top por {}</b>\n\
             • Total guardados: <b>{}</b>\n\
             • Total consultas: <b>{}</b>\n\n\
             <b>🔐 Top guardados</b>\n{}\n\n\
             <b>🔎 Top consultas</b>\n{}",
            self.label,
            self.total_saves,
            self.total_queries,
            ranking(&self.top_saves),
            ranking(&self.top_queries)
        )
    }
}

fn ranking(entries: &[(String, u64)]) -> String {
    if entries.is_empty() {
        return "—".to_owned();
    }
    entries
        .iter()
        .enumerate()
        .map(|(index, (key, count))| format!("{}. {} ({count})", index + 1, escape_html(key)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use super::{
        parse_top_args, percent, tally_keys, week_range, PmfDistribution, ReportRange, TopArgs,
        TopReport, UsageStats,
    };
    use crate::domain::event::{Event, EventKind};
    use crate::domain::feedback::PmfScore;
    use crate::domain::record::UserId;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid time")
    }

    fn event(user: i64, kind: EventKind, created_at: DateTime<Utc>) -> Event {
        Event { id: 0, user_id: UserId(user), kind, meta: None, created_at }
    }

    fn keyed(kind: EventKind, key: &str) -> Event {
        Event {
            id: 0,
            user_id: UserId(1),
            kind,
            meta: Some(json!({ "key_norm": key })),
            created_at: at(2025, 9, 2, 10),
        }
    }

    #[test]
    fn usage_stats_cover_new_active_errors_and_retention() {
        let now = at(2025, 9, 30, 12);
        let events = vec![
            // veteran: first seen long ago, active this week
            event(1, EventKind::Start, now - Duration::days(200)),
            event(1, EventKind::Save, now - Duration::days(2)),
            // new user retained on two days of the first week
            event(2, EventKind::Start, now - Duration::days(5)),
            event(2, EventKind::Unrecognized, now - Duration::days(5)),
            event(2, EventKind::Query, now - Duration::days(3)),
            // cohort member seen on a single day only
            event(3, EventKind::Save, now - Duration::days(20)),
        ];

        let stats = UsageStats::compute(12, &events, now, chrono_tz::UTC);
        assert_eq!(stats.total_records, 12);
        assert_eq!(stats.unique_users, 3);
        assert_eq!(stats.new_users_7d, 1);
        assert_eq!(stats.active_users_7d, 2);
        assert_eq!((stats.unrecognized_30d, stats.tracked_30d), (1, 4));
        assert_eq!((stats.retained_7d, stats.cohort_30d), (1, 2));

        let rendered = stats.render();
        assert!(rendered.contains("Fallos de formato (30d): <b>25.0%</b>  (1/4)"));
        assert!(rendered.contains("Retención 7d (cohorte 30d): <b>50.0%</b>  (1/2)"));
    }

    #[test]
    fn percent_handles_empty_denominator() {
        assert_eq!(percent(0, 0), "0.0%");
        assert_eq!(percent(1, 3), "33.3%");
    }

    #[test]
    fn pmf_distribution_reports_strong_share() {
        let scores: Vec<PmfScore> =
            [5, 4, 4, 1].into_iter().filter_map(|value| PmfScore::new(value).ok()).collect();
        let distribution = PmfDistribution::from_scores(&scores);

        assert_eq!(distribution.total(), 4);
        assert_eq!(distribution.strong(), 3);
        let rendered = distribution.render();
        assert!(rendered.contains("4: 2 (50.0%)"));
        assert!(rendered.contains("2: 0 (0.0%)"));
        assert!(rendered.ends_with("(4-5): 3 (75.0%)"));

        assert_eq!(PmfDistribution::default().render(), "📭 Aún no hay respuestas PMF.");
    }

    #[test]
    fn week_range_starts_on_monday() {
        // Wednesday 2025-09-03
        let now = at(2025, 9, 3, 12);
        let current = week_range(now, 0, chrono_tz::UTC);
        assert_eq!(current.since, at(2025, 9, 1, 0));
        assert_eq!(current.until, at(2025, 9, 8, 0));
        assert_eq!(current.label, "2025-09-01 → 2025-09-08");

        let previous = week_range(now, -1, chrono_tz::UTC);
        assert_eq!(previous.since, at(2025, 8, 25, 0));
    }

    #[test]
    fn week_range_uses_local_midnight() {
        let now = at(2025, 9, 3, 12);
        let range = week_range(now, 0, chrono_tz::Europe::Madrid);
        assert_eq!(range.since, at(2025, 8, 31, 22));
    }

    #[test]
    fn top_arguments_are_parsed() {
        let now = at(2025, 9, 3, 12);
        let tz = chrono_tz::UTC;

        assert!(matches!(parse_top_args("", now, tz), TopArgs::Range(_)));
        assert_eq!(parse_top_args("-1", now, tz), TopArgs::Range(week_range(now, -1, tz)));
        assert_eq!(
            parse_top_args("2025-09-01 2025-09-07", now, tz),
            TopArgs::Range(ReportRange {
                since: at(2025, 9, 1, 0),
                until: at(2025, 9, 7, 0),
                label: "2025-09-01 → 2025-09-07".to_owned(),
            })
        );
        assert!(matches!(parse_top_args("2025-09-07 2025-09-01", now, tz), TopArgs::Invalid(_)));
        assert!(matches!(parse_top_args("2025-02-30 2025-03-01", now, tz), TopArgs::Invalid(_)));
        assert_eq!(parse_top_args("semana pasada", now, tz), TopArgs::Usage);
    }

    #[test]
    fn tally_ranks_by_count_then_key() {
        let events = vec![
            keyed(EventKind::Save, "wifi"),
            keyed(EventKind::Save, "bici"),
            keyed(EventKind::Save, "wifi"),
            keyed(EventKind::Save, "alarma"),
            event(1, EventKind::Save, at(2025, 9, 2, 10)),
        ];
        assert_eq!(
            tally_keys(&events, 10),
            vec![("wifi".to_owned(), 2), ("alarma".to_owned(), 1), ("bici".to_owned(), 1)]
        );
        assert_eq!(tally_keys(&events, 1).len(), 1);
    }

    #[test]
    fn top_report_renders_totals_and_placeholder() {
        let range = week_range(at(2025, 9, 3, 12), 0, chrono_tz::UTC);
        let report = TopReport::build(&range, &[keyed(EventKind::Save, "wifi")], &[]);
        let rendered = report.render();

        assert!(rendered.contains("• Total guardados: <b>1</b>"));
        assert!(rendered.contains("<b>🔐 Top guardados</b>\n1. wifi (1)"));
        assert!(rendered.ends_with("<b>🔎 Top consultas</b>\n—"));
    }
}
