pub mod claude;
pub mod composite;
pub mod mock;
pub mod offline;
pub mod openai;
pub mod parser;
pub mod prompts;
pub mod provider;

pub use claude::ClaudeProvider;
pub use composite::{Completion, CompletionSource, CompositeProvider};
pub use mock::MockProvider;
pub use offline::OfflineGenerator;
pub use openai::OpenAiProvider;
pub use parser::{parse_recommendations, parse_tags, ParsedRecommendations};
pub use prompts::{RecommendationRequest, TagRequest};
pub use provider::LLMProvider;
