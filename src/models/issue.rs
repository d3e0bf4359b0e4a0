use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for IssueState {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "closed" => IssueState::Closed,
            _ => IssueState::Open,
        }
    }
}

/// State qualifier for a retrieval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    Open,
    Closed,
    #[default]
    All,
}

impl StateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateFilter::Open => "open",
            StateFilter::Closed => "closed",
            StateFilter::All => "all",
        }
    }

    pub fn matches(&self, state: IssueState) -> bool {
        match self {
            StateFilter::Open => state == IssueState::Open,
            StateFilter::Closed => state == IssueState::Closed,
            StateFilter::All => true,
        }
    }

    /// The single state this filter selects, if any.
    pub fn state(&self) -> Option<IssueState> {
        match self {
            StateFilter::Open => Some(IssueState::Open),
            StateFilter::Closed => Some(IssueState::Closed),
            StateFilter::All => None,
        }
    }
}

impl From<IssueState> for StateFilter {
    fn from(state: IssueState) -> Self {
        match state {
            IssueState::Open => StateFilter::Open,
            IssueState::Closed => StateFilter::Closed,
        }
    }
}

impl std::fmt::Display for StateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(StateFilter::Open),
            "closed" => Ok(StateFilter::Closed),
            "all" => Ok(StateFilter::All),
            other => Err(Error::Config(format!(
                "state must be open, closed or all, got '{}'",
                other
            ))),
        }
    }
}

/// One ticket from the tracker, never a pull request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueRecord {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub description: String,
    pub labels: BTreeSet<String>,
    pub url: String,
    pub repository: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    pub state: IssueState,
}

impl IssueRecord {
    pub fn is_open(&self) -> bool {
        self.state == IssueState::Open
    }
}

/// Tags derived for one issue. Replaced wholesale on re-extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// Tracker wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
    #[serde(default)]
    pub user: Option<GitHubUserRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUserRef {
    pub login: String,
}

impl GitHubIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some() || self.html_url.contains("/pull/")
    }

    pub fn issue_state(&self) -> IssueState {
        IssueState::from(self.state.as_str())
    }

    pub fn into_record(self, repository: &str) -> IssueRecord {
        let state = self.issue_state();
        IssueRecord {
            id: self.number.to_string(),
            number: self.number,
            title: self.title,
            description: self.body.unwrap_or_default(),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            url: self.html_url,
            repository: repository.to_string(),
            created_at: self.created_at,
            closed_at: self.closed_at,
            state,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<GitHubIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub full_name: String,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default = "default_true")]
    pub has_issues: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: serde_json::Value) -> GitHubIssue {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_pull_request_marker_detected() {
        let pr = raw(serde_json::json!({
            "number": 7,
            "title": "Add feature",
            "state": "open",
            "html_url": "https://github.com/o/r/pull/7",
            "created_at": "2024-03-01T00:00:00Z",
            "pull_request": {"url": "https://api.github.com/repos/o/r/pulls/7"}
        }));
        assert!(pr.is_pull_request());
    }

    #[test]
    fn test_into_record() {
        let issue = raw(serde_json::json!({
            "number": 12,
            "title": "Crash on start",
            "body": null,
            "state": "closed",
            "html_url": "https://github.com/o/r/issues/12",
            "labels": [{"name": "bug"}, {"name": "bug"}],
            "created_at": "2024-03-01T00:00:00Z",
            "closed_at": "2024-03-02T00:00:00Z"
        }));
        assert!(!issue.is_pull_request());
        let record = issue.into_record("o/r");
        assert_eq!(record.id, "12");
        assert_eq!(record.state, IssueState::Closed);
        assert_eq!(record.description, "");
        assert_eq!(record.labels.len(), 1);
        assert_eq!(record.repository, "o/r");
    }

    #[test]
    fn test_state_filter_parse() {
        assert_eq!("Closed".parse::<StateFilter>().unwrap(), StateFilter::Closed);
        assert!("merged".parse::<StateFilter>().is_err());
        assert!(StateFilter::All.matches(IssueState::Closed));
        assert!(!StateFilter::Open.matches(IssueState::Closed));
    }
}
