use async_trait::async_trait;

use crate::error::Result;
use crate::github::paginator::Page;
use crate::models::{GitHubIssue, RepositoryInfo, SearchResponse, StateFilter};

/// Read-only view of an issue tracker, as used by the retrieval engine.
///
/// Listing and single-issue lookups return raw tracker payloads, pull requests
/// included; filtering is the caller's job.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepositoryInfo>;

    /// Newest-created first.
    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        state: StateFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Page<GitHubIssue>>;

    async fn search_issues(&self, query: &str, per_page: u32) -> Result<SearchResponse>;

    async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<GitHubIssue>;
}
