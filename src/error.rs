use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Transient tracker failure: {0}")]
    Transient(String),

    #[error("LLM API error from {provider}: {message}")]
    LLMApi { provider: String, message: String },

    #[error("{provider} did not answer within {secs} seconds")]
    Timeout { provider: String, secs: u64 },

    #[error("{0} returned an empty completion")]
    EmptyCompletion(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Failed to publish on {channel}: {reason}")]
    Publish { channel: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Actor for {0} is no longer running")]
    ActorStopped(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes the recovery boundaries act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    RateLimited,
    Transient,
    ParseFailure,
    PublishFailure,
    Timeout,
    Fatal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::RateLimited(_) => ErrorKind::RateLimited,
            Error::Transient(_) | Error::Network(_) | Error::LLMApi { .. } => ErrorKind::Transient,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::ParseError(_) | Error::EmptyCompletion(_) | Error::Serialization(_) => {
                ErrorKind::ParseFailure
            }
            Error::Publish { .. } => ErrorKind::PublishFailure,
            Error::GitHubApi(_)
            | Error::Config(_)
            | Error::ActorStopped(_)
            | Error::Io(_)
            | Error::Database(_)
            | Error::InvalidHeader(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::RateLimited | ErrorKind::Transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::NotFound("a/b".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::RateLimited(30).kind(), ErrorKind::RateLimited);
        assert_eq!(
            Error::Timeout {
                provider: "Claude".into(),
                secs: 45
            }
            .kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            Error::Publish {
                channel: "primary".into(),
                reason: "closed".into()
            }
            .kind(),
            ErrorKind::PublishFailure
        );
        assert_eq!(Error::ParseError("x".into()).kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::RateLimited(10).is_retryable());
        assert!(Error::Transient("502".into()).is_retryable());
        assert!(!Error::NotFound("x".into()).is_retryable());
        assert!(!Error::Config("x".into()).is_retryable());
    }
}
