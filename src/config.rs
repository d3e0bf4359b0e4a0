use crate::error::{Error, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub database_path: String,
    pub max_issues: u32,
    pub summary_cadence: SummaryCadence,
    pub tag_timeout_secs: u64,
    pub recommendation_timeout_secs: u64,
    pub resubscribe_delay_secs: u64,
    pub resubscribe_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let summary_cadence = match env::var("SUMMARY_CADENCE") {
            Ok(raw) => raw.parse()?,
            Err(_) => SummaryCadence::EveryIssue,
        };

        Ok(Self {
            github_token: non_empty_var("GITHUB_TOKEN"),
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "issuelens.db".to_string()),
            max_issues: parsed_var("MAX_ISSUES", 30),
            summary_cadence,
            tag_timeout_secs: parsed_var("TAG_TIMEOUT_SECS", 45),
            recommendation_timeout_secs: parsed_var("RECOMMENDATION_TIMEOUT_SECS", 60),
            resubscribe_delay_secs: parsed_var("RESUBSCRIBE_DELAY_SECS", 5),
            resubscribe_interval_secs: positive_var("RESUBSCRIBE_INTERVAL_SECS", 30),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Like `parsed_var`, but zero also counts as malformed.
fn positive_var(key: &str, default: u64) -> u64 {
    match parsed_var(key, default) {
        0 => default,
        value => value,
    }
}

/// When the orchestrator regenerates a repository summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryCadence {
    EveryIssue,
    /// On the first ingested issue and on every Nth one after that.
    EveryNth(u32),
}

impl SummaryCadence {
    /// `ingested` is the 1-based count of issues the actor has handled.
    pub fn should_summarize(&self, ingested: u64) -> bool {
        match self {
            SummaryCadence::EveryIssue => true,
            SummaryCadence::EveryNth(n) => {
                ingested == 1 || (*n > 0 && ingested % u64::from(*n) == 0)
            }
        }
    }
}

impl FromStr for SummaryCadence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        if s == "every" {
            return Ok(SummaryCadence::EveryIssue);
        }
        match s.strip_prefix("every:").map(|n| n.trim().parse::<u32>()) {
            Some(Ok(1)) => Ok(SummaryCadence::EveryIssue),
            Some(Ok(n)) if n > 1 => Ok(SummaryCadence::EveryNth(n)),
            _ => Err(Error::Config(format!(
                "SUMMARY_CADENCE must be 'every' or 'every:N' with N >= 1, got '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub summary_cadence: SummaryCadence,
    pub tag_timeout: Duration,
    pub recommendation_timeout: Duration,
    pub resubscribe_delay: Duration,
    pub resubscribe_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            summary_cadence: SummaryCadence::EveryIssue,
            tag_timeout: Duration::from_secs(45),
            recommendation_timeout: Duration::from_secs(60),
            resubscribe_delay: Duration::from_secs(5),
            resubscribe_interval: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            summary_cadence: config.summary_cadence,
            tag_timeout: Duration::from_secs(config.tag_timeout_secs),
            recommendation_timeout: Duration::from_secs(config.recommendation_timeout_secs),
            resubscribe_delay: Duration::from_secs(config.resubscribe_delay_secs),
            resubscribe_interval: Duration::from_secs(config.resubscribe_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_parsing() {
        assert_eq!("every".parse::<SummaryCadence>().unwrap(), SummaryCadence::EveryIssue);
        assert_eq!("every:1".parse::<SummaryCadence>().unwrap(), SummaryCadence::EveryIssue);
        assert_eq!(
            " Every:5 ".parse::<SummaryCadence>().unwrap(),
            SummaryCadence::EveryNth(5)
        );
        assert!("sometimes".parse::<SummaryCadence>().is_err());
        assert!("every:0".parse::<SummaryCadence>().is_err());
    }

    #[test]
    fn test_zero_interval_falls_back_to_default() {
        env::set_var("ISSUELENS_TEST_ZERO_INTERVAL", "0");
        env::set_var("ISSUELENS_TEST_SET_INTERVAL", " 12 ");
        assert_eq!(positive_var("ISSUELENS_TEST_ZERO_INTERVAL", 30), 30);
        assert_eq!(positive_var("ISSUELENS_TEST_SET_INTERVAL", 30), 12);
        assert_eq!(positive_var("ISSUELENS_TEST_UNSET_INTERVAL", 30), 30);
    }

    #[test]
    fn test_every_nth_fires_on_first_and_multiples() {
        let cadence = SummaryCadence::EveryNth(5);
        let fired: Vec<u64> = (1..=12).filter(|n| cadence.should_summarize(*n)).collect();
        assert_eq!(fired, vec![1, 5, 10]);
        assert!(SummaryCadence::EveryIssue.should_summarize(7));
    }
}
