use std::sync::Arc;
use std::time::Duration;

use crate::llm::parser::{parse_tags, MAX_TAGS};
use crate::llm::{CompositeProvider, TagRequest};
use crate::models::{IssueRecord, TagSet};
use crate::taxonomy::TagTaxonomy;

#[derive(Debug, Clone, PartialEq)]
pub struct TagExtraction {
    pub tags: TagSet,
    /// Provider name, "offline", or "rules" when the answer was unusable.
    pub source: String,
}

pub struct TagExtractor {
    llm: Arc<CompositeProvider>,
    taxonomy: TagTaxonomy,
    timeout: Duration,
}

impl TagExtractor {
    pub fn new(llm: Arc<CompositeProvider>, timeout: Duration) -> Self {
        Self {
            llm,
            taxonomy: TagTaxonomy::new(),
            timeout,
        }
    }

    /// Never returns an empty tag set.
    pub async fn extract(&self, issue: &IssueRecord) -> TagExtraction {
        let prompt = TagRequest::new(issue).to_prompt();
        let completion = self.llm.complete(&prompt, self.timeout).await;

        let mut tags = parse_tags(&completion.text);
        let mut source = completion.source_name().to_string();

        if tags.is_empty() {
            tracing::warn!(
                "No tags parsed from {} answer for issue #{}, using rule-based tags",
                source,
                issue.id
            );
            tags = self.rule_based(issue);
            source = "rules".to_string();
        }

        tags.truncate(MAX_TAGS);
        tracing::debug!("Issue #{} tagged by {}: {}", issue.id, source, tags.join(", "));

        TagExtraction {
            tags: tags.into_iter().collect(),
            source,
        }
    }

    fn rule_based(&self, issue: &IssueRecord) -> Vec<String> {
        self.taxonomy.rule_based_tags(
            &issue.title,
            &issue.description,
            issue.labels.iter().map(String::as_str),
            issue.state.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMProvider, MockProvider};
    use crate::models::IssueState;
    use chrono::Utc;

    fn issue() -> IssueRecord {
        IssueRecord {
            id: "42".into(),
            number: 42,
            title: "Segfault when parsing config".into(),
            description: "The app crashes on start".into(),
            labels: Default::default(),
            url: "https://github.com/o/r/issues/42".into(),
            repository: "o/r".into(),
            created_at: Utc::now(),
            closed_at: None,
            state: IssueState::Open,
        }
    }

    fn extractor(providers: Vec<Arc<dyn LLMProvider>>) -> TagExtractor {
        TagExtractor::new(
            Arc::new(CompositeProvider::new(providers)),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_uses_model_tags() {
        let mock = Arc::new(MockProvider::new("mock").with_response("crash, config-parsing, Bug"));
        let extraction = extractor(vec![mock.clone()]).extract(&issue()).await;

        assert_eq!(extraction.source, "mock");
        assert!(extraction.tags.contains("config-parsing"));
        assert!(extraction.tags.contains("bug"));
        assert!(mock.prompts()[0].contains("Segfault when parsing config"));
    }

    #[tokio::test]
    async fn test_all_providers_down_still_tags() {
        let extraction = extractor(vec![
            Arc::new(MockProvider::failing("a")),
            Arc::new(MockProvider::failing("b")),
        ])
        .extract(&issue())
        .await;

        assert_eq!(extraction.source, "offline");
        assert!(extraction.tags.contains("open"));
        assert!(extraction.tags.contains("bug"));
    }

    #[tokio::test]
    async fn test_unparseable_answer_uses_rules() {
        let mock = Arc::new(MockProvider::new("mock").with_response("***\n\n - \n"));
        let extraction = extractor(vec![mock]).extract(&issue()).await;

        assert_eq!(extraction.source, "rules");
        assert!(!extraction.tags.is_empty());
        assert!(extraction.tags.contains("open"));
    }
}
