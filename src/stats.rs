use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

use crate::{
    db::{EventFilter, EventStore},
    domain::Stats,
    errors::AppError,
};

pub const TOP_DOMAINS_LIMIT: usize = 5;

/// Midnight of `now`'s local calendar day.
///
/// The wall-clock midnight is read as if it were UTC, so the boundary is off
/// by the zone offset when compared with UTC event timestamps. Clients have
/// always seen counts computed this way.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    now.naive_local()
        .date()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Monday of the current local week, same convention as [`start_of_day`].
pub fn start_of_week<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let days_since_monday = now.naive_local().weekday().num_days_from_monday();
    start_of_day(now) - Duration::days(i64::from(days_since_monday))
}

/// Percentage of successful events, rounded to two decimals; zero when empty.
pub fn success_rate(successful: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let rate = successful as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

async fn gather(
    store: &dyn EventStore,
    day_start: DateTime<Utc>,
    week_start: DateTime<Utc>,
) -> Result<Stats, AppError> {
    let total = store.count(&EventFilter::all()).await?;
    let today = store.count(&EventFilter::all().since(day_start)).await?;
    let this_week = store.count(&EventFilter::all().since(week_start)).await?;
    let top_domains = store.top_domains(TOP_DOMAINS_LIMIT).await?;
    let successful = store.count(&EventFilter::all().success(true)).await?;

    Ok(Stats {
        total,
        today,
        this_week,
        top_domains,
        success_rate: success_rate(successful, total),
    })
}

/// Any storage failure yields `StatsUnavailable`; partial results are never returned.
pub async fn compute_stats<Tz: TimeZone>(
    store: &dyn EventStore,
    now: &DateTime<Tz>,
) -> Result<Stats, AppError> {
    gather(store, start_of_day(now), start_of_week(now))
        .await
        .map_err(|err| AppError::StatsUnavailable(Box::new(err)))
}
