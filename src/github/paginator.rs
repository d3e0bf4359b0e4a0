use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::github::client::check_status;
use crate::github::rate_limiter::RateLimiter;

/// Upper bound on the page size the tracker accepts.
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_next: false,
        }
    }
}

pub struct Paginator<'a> {
    client: &'a Client,
    rate_limiter: &'a RateLimiter,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a Client, rate_limiter: &'a RateLimiter) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }

    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        base_url: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<T>> {
        self.rate_limiter.wait().await;

        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let separator = if base_url.contains('?') { "&" } else { "?" };
        let url = format!("{}{}per_page={}&page={}", base_url, separator, per_page, page);

        tracing::debug!("Fetching: {}", url);
        let response = self.client.get(&url).send().await?;
        self.rate_limiter.update_from_response(&response);
        let response = check_status(response, self.rate_limiter, &url).await?;

        let has_next = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .map(has_next_link)
            .unwrap_or(false);

        let items: Vec<T> = response.json().await?;
        let has_next = has_next && items.len() >= per_page as usize;

        Ok(Page { items, has_next })
    }
}

fn has_next_link(link: &str) -> bool {
    link.split(',').any(|part| part.contains("rel=\"next\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_link_detection() {
        let link = r#"<https://api.github.com/repositories/1/issues?page=2>; rel="next", <https://api.github.com/repositories/1/issues?page=5>; rel="last""#;
        assert!(has_next_link(link));
        let last = r#"<https://api.github.com/repositories/1/issues?page=1>; rel="prev""#;
        assert!(!has_next_link(last));
    }
}
