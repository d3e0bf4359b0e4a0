use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::analysis::recommender::Recommender;
use crate::models::{
    IssueRecord, IssueState, RangeGranularity, RepositorySummary, TagStatistic, TimeRangeStat,
};
use crate::orchestrator::OrchestratorState;

const DAILY_BUCKETS: i64 = 7;
const WEEKLY_BUCKETS: i64 = 4;
const MONTHLY_BUCKETS: u32 = 6;

/// Every tag with its count, most frequent first, ties by name.
pub fn tag_statistics(frequencies: &HashMap<String, u32>) -> Vec<TagStatistic> {
    let total: u32 = frequencies.values().sum();
    let mut stats: Vec<TagStatistic> = frequencies
        .iter()
        .map(|(tag, &count)| TagStatistic {
            tag: tag.clone(),
            count,
            percentage: if total == 0 {
                0.0
            } else {
                count as f32 / total as f32 * 100.0
            },
        })
        .collect();

    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    stats
}

/// Bucket size follows how far back the oldest issue goes.
pub fn granularity_for(issues: &[&IssueRecord], now: DateTime<Utc>) -> RangeGranularity {
    let oldest = issues.iter().map(|i| i.created_at).min().unwrap_or(now);
    let span = now - oldest;

    if span < Duration::days(30) {
        RangeGranularity::Daily
    } else if span < Duration::days(90) {
        RangeGranularity::Weekly
    } else {
        RangeGranularity::Monthly
    }
}

/// Contiguous, oldest-first buckets ending at `now`.
pub fn bucket_bounds(
    granularity: RangeGranularity,
    now: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    match granularity {
        RangeGranularity::Daily => fixed_buckets(now, Duration::days(1), DAILY_BUCKETS),
        RangeGranularity::Weekly => fixed_buckets(now, Duration::weeks(1), WEEKLY_BUCKETS),
        RangeGranularity::Monthly => month_buckets(now, MONTHLY_BUCKETS),
    }
}

fn fixed_buckets(
    now: DateTime<Utc>,
    width: Duration,
    count: i64,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    (0..count)
        .map(|i| {
            let start = now - width * (count - i) as i32;
            (start, start + width)
        })
        .collect()
}

fn month_buckets(now: DateTime<Utc>, count: u32) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut starts: Vec<DateTime<Utc>> = (0..count)
        .rev()
        .map(|back| month_start(now, back))
        .collect();
    starts.dedup();

    let mut bounds = Vec::with_capacity(starts.len());
    for (i, start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(now);
        bounds.push((*start, end));
    }
    bounds
}

/// Midnight on the first day of the month `back` months before `now`.
fn month_start(now: DateTime<Utc>, back: u32) -> DateTime<Utc> {
    let months = now.year() * 12 + now.month0() as i32 - back as i32;
    let (year, month0) = (months.div_euclid(12), months.rem_euclid(12) as u32);

    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| now - Duration::days(30 * i64::from(back)))
}

/// Created and closed counts per bucket. Closed issues without a close date
/// count as closed when they were created.
pub fn activity_ranges(
    issues: &[&IssueRecord],
    now: DateTime<Utc>,
) -> (RangeGranularity, Vec<TimeRangeStat>) {
    let granularity = granularity_for(issues, now);
    let bounds = bucket_bounds(granularity, now);
    let last = bounds.len().saturating_sub(1);

    let ranges = bounds
        .iter()
        .enumerate()
        .map(|(i, &(start, end))| {
            let contains = |t: DateTime<Utc>| t >= start && (t < end || (i == last && t <= end));
            let issues_created = issues.iter().filter(|issue| contains(issue.created_at)).count();
            let issues_closed = issues
                .iter()
                .filter(|issue| issue.state == IssueState::Closed)
                .filter(|issue| contains(issue.closed_at.unwrap_or(issue.created_at)))
                .count();

            TimeRangeStat {
                start_date: start,
                end_date: end,
                issues_created: issues_created as u32,
                issues_closed: issues_closed as u32,
            }
        })
        .collect();

    (granularity, ranges)
}

/// Builds repository summaries from actor state.
pub struct SummaryGenerator {
    recommender: Arc<Recommender>,
}

impl SummaryGenerator {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        Self { recommender }
    }

    /// `None` when the repository has no issues yet.
    pub async fn generate(&self, state: &OrchestratorState) -> Option<RepositorySummary> {
        if state.issue_count() == 0 {
            tracing::debug!("No issues for {}, skipping summary", state.repository);
            return None;
        }

        let now = Utc::now();
        let issues: Vec<&IssueRecord> = state.issues().collect();
        let top_tags = tag_statistics(&state.tag_frequencies());
        let (granularity, time_ranges) = activity_ranges(&issues, now);

        let outcome = self
            .recommender
            .recommend(&state.repository, &issues, &top_tags, &state.issues_by_tag())
            .await;

        let open_count = issues.iter().filter(|i| i.is_open()).count() as u32;
        let total_issues = issues.len() as u32;

        tracing::info!(
            "Summary for {}: {} issues, {} distinct tags, {} recommendations from {}",
            state.repository,
            total_issues,
            top_tags.len(),
            outcome.recommendations.len(),
            outcome.source
        );

        Some(RepositorySummary {
            repository: state.repository.clone(),
            generated_at: now,
            total_issues,
            open_count,
            closed_count: total_issues - open_count,
            top_tags,
            recommendations: outcome.recommendations,
            granularity,
            time_ranges,
        })
    }
}
