use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};

use crate::error::{Error, Result};
use crate::github::paginator::{Page, Paginator, MAX_PER_PAGE};
use crate::github::rate_limiter::RateLimiter;
use crate::github::tracker::IssueTracker;
use crate::models::{GitHubIssue, RepositoryInfo, SearchResponse, StateFilter};

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: Option<&str>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("issuelens/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(),
            base_url: "https://api.github.com".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    async fn get(&self, url: &str) -> Result<Response> {
        self.rate_limiter.wait().await;
        let response = self.client.get(url).send().await?;
        self.rate_limiter.update_from_response(&response);
        check_status(response, &self.rate_limiter, url).await
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepositoryInfo> {
        let url = format!("{}/repos/{}/{}", self.base_url, owner, repo);
        tracing::info!("Checking repository: {}/{}", owner, repo);
        Ok(self.get(&url).await?.json().await?)
    }

    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        state: StateFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Page<GitHubIssue>> {
        let url = format!(
            "{}/repos/{}/{}/issues?state={}&sort=created&direction=desc",
            self.base_url, owner, repo, state
        );
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        paginator.fetch_page(&url, page, per_page).await
    }

    async fn search_issues(&self, query: &str, per_page: u32) -> Result<SearchResponse> {
        let url = format!(
            "{}/search/issues?q={}&sort=created&order=desc&per_page={}",
            self.base_url,
            urlencoding::encode(query),
            per_page.clamp(1, MAX_PER_PAGE)
        );
        tracing::debug!("Searching issues: {}", query);
        Ok(self.get(&url).await?.json().await?)
    }

    async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<GitHubIssue> {
        let url = format!("{}/repos/{}/{}/issues/{}", self.base_url, owner, repo, number);
        Ok(self.get(&url).await?.json().await?)
    }
}

/// Maps tracker status codes onto the error taxonomy.
pub(crate) async fn check_status(
    response: Response,
    rate_limiter: &RateLimiter,
    url: &str,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(url.to_string()));
    }

    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (quota_exhausted || retry_after.is_some()))
    {
        let secs = retry_after
            .or_else(|| rate_limiter.retry_after_secs())
            .unwrap_or(60);
        return Err(Error::RateLimited(secs));
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(Error::Transient(format!("{} from {}: {}", status, url, body)));
    }

    Err(Error::GitHubApi(format!(
        "Request to {} failed: {} - {}",
        url, status, body
    )))
}
