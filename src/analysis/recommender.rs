use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::parser::parse_recommendations;
use crate::llm::prompts::RECOMMENDATION_COUNT;
use crate::llm::{CompositeProvider, RecommendationRequest};
use crate::models::{IssueRecord, Priority, Recommendation, TagStatistic};

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationOutcome {
    pub recommendations: Vec<Recommendation>,
    /// Provider name, or "tag-frequency" when the model round failed.
    pub source: String,
    /// Parsing strategy that produced the list, when a model answered.
    pub strategy: Option<&'static str>,
}

pub struct Recommender {
    llm: Arc<CompositeProvider>,
    timeout: Duration,
}

impl Recommender {
    pub fn new(llm: Arc<CompositeProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// `top_tags` must be ranked by count, highest first. `issues_by_tag` maps
    /// each tag to the ids of the issues carrying it.
    pub async fn recommend(
        &self,
        repository: &str,
        issues: &[&IssueRecord],
        top_tags: &[TagStatistic],
        issues_by_tag: &HashMap<String, Vec<String>>,
    ) -> RecommendationOutcome {
        let request = RecommendationRequest::new(repository, issues.iter().copied());
        let issue_ids = request.issue_ids();
        let completion = self.llm.complete(&request.to_prompt(), self.timeout).await;

        if completion.is_offline() {
            tracing::info!(
                "No model produced recommendations for {}, deriving them from tag frequencies",
                repository
            );
            return RecommendationOutcome {
                recommendations: from_tag_frequencies(top_tags, issues, issues_by_tag),
                source: "tag-frequency".to_string(),
                strategy: None,
            };
        }

        let parsed = parse_recommendations(&completion.text, &issue_ids);
        if parsed.is_fallback() {
            tracing::warn!(
                "Could not parse recommendations from {} for {}",
                completion.source_name(),
                repository
            );
        }

        RecommendationOutcome {
            strategy: Some(parsed.strategy()),
            recommendations: parsed.into_inner(),
            source: completion.source_name().to_string(),
        }
    }
}

/// Templated recommendations for the `RECOMMENDATION_COUNT` most frequent tags,
/// followed by a standing review item.
pub fn from_tag_frequencies(
    top_tags: &[TagStatistic],
    issues: &[&IssueRecord],
    issues_by_tag: &HashMap<String, Vec<String>>,
) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = top_tags
        .iter()
        .take(RECOMMENDATION_COUNT)
        .map(|stat| {
            let (title, description, priority) = template_for(&stat.tag, stat.count);
            Recommendation {
                title,
                description,
                priority,
                supporting_issue_ids: issues_by_tag.get(&stat.tag).cloned().unwrap_or_default(),
            }
        })
        .collect();

    let open_ids: Vec<String> = issues
        .iter()
        .filter(|i| i.is_open())
        .map(|i| i.id.clone())
        .collect();
    recommendations.push(Recommendation {
        title: "Review open issues".to_string(),
        description: format!(
            "{} issue(s) are still open. Go through them, close stale ones and assign owners to the rest.",
            open_ids.len()
        ),
        priority: Priority::Medium,
        supporting_issue_ids: open_ids,
    });

    recommendations
}

fn template_for(tag: &str, count: u32) -> (String, String, Priority) {
    match tag {
        "bug" | "bugs" => (
            "Prioritize bug fixes".to_string(),
            format!("{} issue(s) report bugs. Schedule a stabilization pass before adding new features.", count),
            Priority::High,
        ),
        "feature" | "enhancement" | "feature-request" => (
            "Plan the feature roadmap".to_string(),
            format!("{} issue(s) ask for new functionality. Group them and decide which ones fit the roadmap.", count),
            Priority::Medium,
        ),
        "documentation" | "docs" => (
            "Improve the documentation".to_string(),
            format!("{} issue(s) point at documentation gaps. Update guides and examples where users get stuck.", count),
            Priority::Medium,
        ),
        "security" => (
            "Address security concerns".to_string(),
            format!("{} issue(s) mention security. Review them first and publish fixes or advisories.", count),
            Priority::High,
        ),
        "performance" => (
            "Investigate performance problems".to_string(),
            format!("{} issue(s) describe slowness or resource usage. Profile the affected paths.", count),
            Priority::Medium,
        ),
        other => (
            format!("Look into {} issues", other),
            format!("'{}' is one of the most frequent tags ({} occurrence(s)). Check whether these issues share a root cause.", other, count),
            Priority::Low,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMProvider, MockProvider};
    use crate::models::IssueState;
    use chrono::Utc;

    fn issue(id: &str, state: IssueState) -> IssueRecord {
        IssueRecord {
            id: id.into(),
            number: id.parse().unwrap_or(0),
            title: format!("Issue {}", id),
            description: String::new(),
            labels: Default::default(),
            url: String::new(),
            repository: "o/r".into(),
            created_at: Utc::now(),
            closed_at: None,
            state,
        }
    }

    fn stat(tag: &str, count: u32) -> TagStatistic {
        TagStatistic {
            tag: tag.into(),
            count,
            percentage: 0.0,
        }
    }

    #[test]
    fn test_templates_cover_top_three() {
        let a = issue("1", IssueState::Open);
        let b = issue("2", IssueState::Closed);
        let tags = vec![stat("bug", 5), stat("ui", 3), stat("security", 2), stat("docs", 1)];
        let by_tag = HashMap::from([("bug".to_string(), vec!["1".to_string(), "2".to_string()])]);

        let recs = from_tag_frequencies(&tags, &[&a, &b], &by_tag);
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[0].title, "Prioritize bug fixes");
        assert_eq!(recs[0].supporting_issue_ids, vec!["1", "2"]);
        assert_eq!(recs[1].title, "Look into ui issues");
        assert_eq!(recs[2].priority, Priority::High);
        assert_eq!(recs[3].title, "Review open issues");
        assert_eq!(recs[3].supporting_issue_ids, vec!["1"]);
    }

    #[tokio::test]
    async fn test_offline_round_uses_templates() {
        let llm = Arc::new(CompositeProvider::new(vec![
            Arc::new(MockProvider::failing("a")) as Arc<dyn LLMProvider>,
        ]));
        let a = issue("1", IssueState::Open);
        let outcome = Recommender::new(llm, Duration::from_secs(5))
            .recommend("o/r", &[&a], &[stat("performance", 1)], &HashMap::new())
            .await;

        assert_eq!(outcome.source, "tag-frequency");
        assert_eq!(outcome.recommendations[0].title, "Investigate performance problems");
    }

    #[tokio::test]
    async fn test_model_answer_is_parsed() {
        let llm = Arc::new(CompositeProvider::new(vec![Arc::new(
            MockProvider::new("mock").with_response(
                "RECOMMENDATION 1:\nTitle: Fix login\nPriority: High\nDescription: Broken\nSupporting Issues: #1",
            ),
        ) as Arc<dyn LLMProvider>]));
        let a = issue("1", IssueState::Open);
        let outcome = Recommender::new(llm, Duration::from_secs(5))
            .recommend("o/r", &[&a], &[], &HashMap::new())
            .await;

        assert_eq!(outcome.source, "mock");
        assert_eq!(outcome.strategy, Some("structured"));
        assert_eq!(outcome.recommendations[0].supporting_issue_ids, vec!["1"]);
    }
}
