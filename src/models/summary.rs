use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recommendation::Recommendation;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagStatistic {
    pub tag: String,
    pub count: u32,
    /// Share of all tag occurrences in the repository, 0-100.
    pub percentage: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeRangeStat {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub issues_created: u32,
    pub issues_closed: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RangeGranularity {
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for RangeGranularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeGranularity::Daily => write!(f, "daily"),
            RangeGranularity::Weekly => write!(f, "weekly"),
            RangeGranularity::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositorySummary {
    pub repository: String,
    pub generated_at: DateTime<Utc>,
    pub total_issues: u32,
    pub open_count: u32,
    pub closed_count: u32,
    pub top_tags: Vec<TagStatistic>,
    pub recommendations: Vec<Recommendation>,
    pub granularity: RangeGranularity,
    pub time_ranges: Vec<TimeRangeStat>,
}
