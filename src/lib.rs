pub mod analysis;
pub mod channel;
pub mod config;
pub mod error;
pub mod github;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod storage;
pub mod taxonomy;

pub use config::{Config, OrchestratorConfig, SummaryCadence};
pub use error::{Error, ErrorKind, Result};
pub use github::{GitHubClient, IssueRetriever, IssueTracker};
pub use llm::{ClaudeProvider, CompositeProvider, LLMProvider, OpenAiProvider};
pub use orchestrator::{ActorContext, Orchestrator, SubscriptionManager, TurnReport};
pub use storage::StateStore;
