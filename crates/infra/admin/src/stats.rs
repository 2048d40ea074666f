//! Statistics and analytics.
//!
//! Daily visit aggregation turns a flat list of timestamped events into one
//! bucket per calendar day (UTC), including days without events.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::{Filter, Query};
use novel_admin_core::traits::{DataAccess, DataAccessExt, Record};
use novel_admin_core::types::{Book, Chapter, LoginLog, Profile, VisitEvent, Withdrawal};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};

use crate::AdminConsole;

/// Procedure that counts rows server-side.
pub const COUNT_ROWS: &str = "count_rows";

/// One calendar day's worth of events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub event_count: u64,
    pub distinct_actor_count: u64,
}

/// Aggregates events into daily buckets over `[start, end]`.
///
/// Every calendar day from `start`'s date to `end`'s date is present, in
/// ascending order, even without events. Events timestamped outside
/// `[start, end]` are ignored. Fails with `InvalidRange` if `start > end`.
pub fn aggregate_daily(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    events: &[VisitEvent],
) -> AdminResult<Vec<DailyBucket>> {
    if start > end {
        return Err(AdminError::InvalidRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }

    let mut days: BTreeMap<NaiveDate, (u64, HashSet<&str>)> = BTreeMap::new();
    let last = end.date_naive();
    let mut day = start.date_naive();
    loop {
        days.insert(day, (0, HashSet::new()));
        if day >= last {
            break;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    for event in events {
        if event.occurred_at < start || event.occurred_at > end {
            continue;
        }
        if let Some((count, actors)) = days.get_mut(&event.occurred_at.date_naive()) {
            *count += 1;
            actors.insert(event.actor_id.as_str());
        }
    }

    Ok(days
        .into_iter()
        .map(|(date, (event_count, actors))| DailyBucket {
            date,
            event_count,
            distinct_actor_count: actors.len() as u64,
        })
        .collect())
}

/// First and last instant of a span of whole UTC days.
///
/// The span ends on the last nanosecond of `last`, so `NaiveDate::MAX` is
/// still a valid final day.
pub fn day_span(first: NaiveDate, last: NaiveDate) -> AdminResult<(DateTime<Utc>, DateTime<Utc>)> {
    let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
        .ok_or_else(|| AdminError::internal("end of day is not a valid time"))?;
    let start = Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN));
    let end = Utc.from_utc_datetime(&last.and_time(end_of_day));
    Ok((start, end))
}

/// Platform totals shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_users: usize,
    pub total_books: usize,
    pub total_chapters: usize,
    pub pending_withdrawals: usize,
    /// Sign-ins today.
    pub visits_today: u64,
    /// Distinct members signed in today.
    pub unique_visitors_today: u64,
}

/// Time series data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Chart data for analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub label: String,
    pub data: Vec<DataPoint>,
}

impl ChartData {
    /// Creates new chart data.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: Vec::new(),
        }
    }

    /// Adds a data point.
    pub fn point(mut self, timestamp: DateTime<Utc>, value: f64) -> Self {
        self.data.push(DataPoint { timestamp, value });
        self
    }

    /// Visit counts per day.
    pub fn visits(buckets: &[DailyBucket]) -> Self {
        Self::from_buckets("Visits", buckets, |b| b.event_count)
    }

    /// Distinct visitors per day.
    pub fn unique_visitors(buckets: &[DailyBucket]) -> Self {
        Self::from_buckets("Unique Visitors", buckets, |b| b.distinct_actor_count)
    }

    fn from_buckets(label: &str, buckets: &[DailyBucket], value: impl Fn(&DailyBucket) -> u64) -> Self {
        buckets.iter().fold(Self::new(label), |chart, bucket| {
            let midnight = Utc.from_utc_datetime(&bucket.date.and_time(NaiveTime::MIN));
            chart.point(midnight, value(bucket) as f64)
        })
    }
}

/// Analytics dashboard data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsDashboard {
    pub stats: SystemStats,
    pub buckets: Vec<DailyBucket>,
    pub visits_chart: ChartData,
    pub visitors_chart: ChartData,
}

/// Statistics page.
pub struct Stats<'a> {
    console: &'a AdminConsole,
}

impl<'a> Stats<'a> {
    pub(crate) fn new(console: &'a AdminConsole) -> Self {
        Self { console }
    }

    /// Daily visits and unique visitors over whole UTC days.
    pub async fn daily_visits(&self, first: NaiveDate, last: NaiveDate) -> AdminResult<Vec<DailyBucket>> {
        self.console.authorize()?;
        let (start, end) = day_span(first, last)?;
        if start > end {
            return Err(AdminError::InvalidRange {
                start: first.to_string(),
                end: last.to_string(),
            });
        }
        let query = Query::new()
            .gte("created_at", start.to_rfc3339())
            .lte("created_at", end.to_rfc3339())
            .order_by("created_at", true);
        let (logs, _) = self
            .console
            .logged(self.console.data().fetch::<LoginLog>(&query))
            .await?;
        tracing::debug!(%first, %last, logs = logs.len(), "aggregating visits");
        let events: Vec<VisitEvent> = logs.iter().map(VisitEvent::from).collect();
        aggregate_daily(start, end, &events)
    }

    /// Server-side row count of a collection.
    pub async fn count(&self, collection: &str, filters: Vec<Filter>) -> AdminResult<usize> {
        let value = self
            .console
            .logged(
                self.console
                    .data()
                    .invoke_procedure(COUNT_ROWS, json!({ "collection": collection, "filters": filters })),
            )
            .await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| AdminError::backend(format!("{} returned {}", COUNT_ROWS, value)))
    }

    /// Current totals plus today's visits.
    pub async fn system_stats(&self, today: NaiveDate) -> AdminResult<SystemStats> {
        self.console.authorize()?;
        let pending = vec![Filter::eq("status", "pending")];
        let visits = self.daily_visits(today, today).await?;
        let today_bucket = visits.first();
        Ok(SystemStats {
            total_users: self.count(Profile::COLLECTION, vec![]).await?,
            total_books: self.count(Book::COLLECTION, vec![]).await?,
            total_chapters: self.count(Chapter::COLLECTION, vec![]).await?,
            pending_withdrawals: self.count(Withdrawal::COLLECTION, pending).await?,
            visits_today: today_bucket.map(|b| b.event_count).unwrap_or(0),
            unique_visitors_today: today_bucket.map(|b| b.distinct_actor_count).unwrap_or(0),
        })
    }

    /// Totals plus visit charts for the last `days` days ending on `today`.
    pub async fn dashboard(&self, today: NaiveDate, days: u32) -> AdminResult<AnalyticsDashboard> {
        let first = today
            .checked_sub_signed(Duration::days(i64::from(days.max(1)) - 1))
            .ok_or_else(|| AdminError::InvalidRange {
                start: format!("{} days before {}", days, today),
                end: today.to_string(),
            })?;
        let stats = self.system_stats(today).await?;
        let buckets = self.daily_visits(first, today).await?;
        Ok(AnalyticsDashboard {
            stats,
            visits_chart: ChartData::visits(&buckets),
            visitors_chart: ChartData::unique_visitors(&buckets),
            buckets,
        })
    }
}
