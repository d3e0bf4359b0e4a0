use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{IssueRecord, RepositorySummary, TagSet};

/// Summaries kept in state when no channel accepted them.
pub const MAX_RETAINED_SUMMARIES: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorPhase {
    #[default]
    Idle,
    Ingesting,
    Extracting,
    Summarizing,
    Publishing,
}

impl std::fmt::Display for ActorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorPhase::Idle => write!(f, "idle"),
            ActorPhase::Ingesting => write!(f, "ingesting"),
            ActorPhase::Extracting => write!(f, "extracting"),
            ActorPhase::Summarizing => write!(f, "summarizing"),
            ActorPhase::Publishing => write!(f, "publishing"),
        }
    }
}

/// Durable state of one repository actor.
///
/// Every key of `tags` is also a key of `issues`, and no stored tag set is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorState {
    pub repository: String,
    issues: BTreeMap<String, IssueRecord>,
    tags: BTreeMap<String, TagSet>,
    retained_summaries: Vec<RepositorySummary>,
    /// Ingestion events handled, re-deliveries included.
    pub ingested_count: u64,
    #[serde(skip)]
    pub phase: ActorPhase,
}

impl OrchestratorState {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Self::default()
        }
    }

    /// Last write wins. Returns true when the id was not known before.
    pub fn upsert_issue(&mut self, issue: IssueRecord) -> bool {
        self.issues.insert(issue.id.clone(), issue).is_none()
    }

    /// Replaces the tag set of a known issue.
    pub fn record_tags(&mut self, issue_id: &str, tags: TagSet) -> Result<()> {
        if !self.issues.contains_key(issue_id) {
            return Err(Error::NotFound(format!(
                "issue {} is not tracked for {}",
                issue_id, self.repository
            )));
        }
        if tags.is_empty() {
            return Err(Error::ParseError(format!("empty tag set for issue {}", issue_id)));
        }
        self.tags.insert(issue_id.to_string(), tags);
        Ok(())
    }

    pub fn issue(&self, issue_id: &str) -> Option<&IssueRecord> {
        self.issues.get(issue_id)
    }

    pub fn issues(&self) -> impl Iterator<Item = &IssueRecord> {
        self.issues.values()
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn tags_for(&self, issue_id: &str) -> Option<&TagSet> {
        self.tags.get(issue_id)
    }

    pub fn tag_sets(&self) -> impl Iterator<Item = (&String, &TagSet)> {
        self.tags.iter()
    }

    /// Occurrences of each tag across all stored tag sets.
    pub fn tag_frequencies(&self) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for tag in self.tags.values().flat_map(|set| set.iter()) {
            *counts.entry(tag.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Tag to the ids of the issues carrying it, ids in ascending key order.
    pub fn issues_by_tag(&self) -> HashMap<String, Vec<String>> {
        let mut index: HashMap<String, Vec<String>> = HashMap::new();
        for (issue_id, set) in &self.tags {
            for tag in set.iter() {
                index.entry(tag.clone()).or_default().push(issue_id.clone());
            }
        }
        index
    }

    pub fn tag_occurrences(&self) -> usize {
        self.tags.values().map(TagSet::len).sum()
    }

    pub fn retain_summary(&mut self, summary: RepositorySummary) {
        self.retained_summaries.push(summary);
        if self.retained_summaries.len() > MAX_RETAINED_SUMMARIES {
            let excess = self.retained_summaries.len() - MAX_RETAINED_SUMMARIES;
            self.retained_summaries.drain(..excess);
        }
    }

    pub fn retained_summaries(&self) -> &[RepositorySummary] {
        &self.retained_summaries
    }

    /// Drops tag entries whose issue is unknown, e.g. from a hand-edited snapshot.
    pub fn repair(&mut self) -> usize {
        let before = self.tags.len();
        let issues = &self.issues;
        self.tags.retain(|id, set| issues.contains_key(id) && !set.is_empty());
        before - self.tags.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueState;
    use chrono::Utc;

    fn issue(id: &str) -> IssueRecord {
        IssueRecord {
            id: id.to_string(),
            number: id.parse().unwrap_or(0),
            title: format!("Issue {}", id),
            description: String::new(),
            labels: Default::default(),
            url: String::new(),
            repository: "o/r".to_string(),
            created_at: Utc::now(),
            closed_at: None,
            state: IssueState::Open,
        }
    }

    #[test]
    fn test_upsert_is_last_write_wins() {
        let mut state = OrchestratorState::new("o/r");
        assert!(state.upsert_issue(issue("1")));

        let mut updated = issue("1");
        updated.title = "Renamed".to_string();
        assert!(!state.upsert_issue(updated));
        assert_eq!(state.issue_count(), 1);
        assert_eq!(state.issue("1").map(|i| i.title.as_str()), Some("Renamed"));
    }

    #[test]
    fn test_tags_require_known_issue() {
        let mut state = OrchestratorState::new("o/r");
        let tags: TagSet = ["bug"].into_iter().collect();
        assert!(state.record_tags("9", tags.clone()).is_err());

        state.upsert_issue(issue("9"));
        state.record_tags("9", tags).unwrap();
        assert!(state.record_tags("9", TagSet::new()).is_err());
        assert_eq!(state.tag_occurrences(), 1);
    }

    #[test]
    fn test_tag_frequencies() {
        let mut state = OrchestratorState::new("o/r");
        state.upsert_issue(issue("1"));
        state.upsert_issue(issue("2"));
        state.record_tags("1", ["bug", "ui"].into_iter().collect()).unwrap();
        state.record_tags("2", ["bug"].into_iter().collect()).unwrap();

        let freq = state.tag_frequencies();
        assert_eq!(freq["bug"], 2);
        assert_eq!(freq["ui"], 1);
        assert_eq!(state.tag_occurrences(), 3);
        assert_eq!(state.issues_by_tag()["bug"], vec!["1", "2"]);
    }

    #[test]
    fn test_repair_drops_orphans() {
        let json = serde_json::json!({
            "repository": "o/r",
            "issues": {},
            "tags": {"7": ["bug"]},
            "retained_summaries": [],
            "ingested_count": 1
        });
        let mut state: OrchestratorState = serde_json::from_value(json).unwrap();
        assert_eq!(state.repair(), 1);
        assert_eq!(state.tag_occurrences(), 0);
    }
}
