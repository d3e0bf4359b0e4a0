use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{IssueRecord, RepositorySummary};

/// Raw issues entering the system.
pub const ISSUES_NAMESPACE: &str = "issues";
/// Derived results: extracted tags and summary reports.
pub const INSIGHTS_NAMESPACE: &str = "insights";

/// Reserved all-zero partition carrying broadcast summary reports.
pub fn broadcast_partition() -> String {
    Uuid::nil().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    IssueIngested {
        issue: IssueRecord,
    },
    TagsExtracted {
        repository: String,
        issue_id: String,
        tags: Vec<String>,
        source: String,
    },
    SummaryReport {
        summary: RepositorySummary,
    },
}

impl ChannelEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelEvent::IssueIngested { .. } => "issue_ingested",
            ChannelEvent::TagsExtracted { .. } => "tags_extracted",
            ChannelEvent::SummaryReport { .. } => "summary_report",
        }
    }
}

/// One message on an event channel, addressed by namespace and partition key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub namespace: String,
    pub partition_key: String,
    pub published_at: DateTime<Utc>,
    pub event: ChannelEvent,
}

impl Envelope {
    pub fn new(namespace: &str, partition_key: impl Into<String>, event: ChannelEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            namespace: namespace.to_string(),
            partition_key: partition_key.into(),
            published_at: Utc::now(),
            event,
        }
    }

    pub fn issue_ingested(issue: IssueRecord) -> Self {
        let key = issue.repository.clone();
        Self::new(ISSUES_NAMESPACE, key, ChannelEvent::IssueIngested { issue })
    }

    pub fn tags_extracted(
        repository: &str,
        issue_id: &str,
        tags: Vec<String>,
        source: &str,
    ) -> Self {
        Self::new(
            INSIGHTS_NAMESPACE,
            repository,
            ChannelEvent::TagsExtracted {
                repository: repository.to_string(),
                issue_id: issue_id.to_string(),
                tags,
                source: source.to_string(),
            },
        )
    }

    pub fn summary_report(summary: RepositorySummary) -> Self {
        Self::new(
            INSIGHTS_NAMESPACE,
            broadcast_partition(),
            ChannelEvent::SummaryReport { summary },
        )
    }

    pub fn is_broadcast(&self) -> bool {
        self.partition_key == broadcast_partition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let envelope = Envelope::tags_extracted("o/r", "3", vec!["bug".into()], "Claude");
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["namespace"], "insights");
        assert_eq!(json["partition_key"], "o/r");
        assert_eq!(json["event"]["type"], "tags_extracted");
        assert_eq!(json["event"]["issue_id"], "3");
        assert!(!envelope.is_broadcast());
    }

    #[test]
    fn test_broadcast_partition_is_nil() {
        assert_eq!(broadcast_partition(), "00000000-0000-0000-0000-000000000000");
    }
}
