pub mod client;
pub mod heuristics;
pub mod paginator;
pub mod rate_limiter;
pub mod retrieval;
pub mod sampling;
pub mod tracker;

pub use client::GitHubClient;
pub use paginator::{Page, Paginator};
pub use rate_limiter::RateLimiter;
pub use retrieval::{IssueRetriever, RetrievalReport};
pub use sampling::SamplingPlan;
pub use tracker::IssueTracker;
