use crate::llm::prompts::TAG_TASK_MARKER;
use crate::taxonomy::TagTaxonomy;

pub const OFFLINE_NOTICE: &str =
    "No language model was available to analyze these issues; recommendations were derived from tag frequencies.";

/// Deterministic last link of the provider chain. Reads the fields back out of
/// the prompt and answers without any network access.
pub struct OfflineGenerator {
    taxonomy: TagTaxonomy,
}

impl OfflineGenerator {
    pub fn new() -> Self {
        Self {
            taxonomy: TagTaxonomy::new(),
        }
    }

    /// Always non-empty.
    pub fn generate(&self, prompt: &str) -> String {
        match prompt.lines().next().map(str::trim) {
            Some(TAG_TASK_MARKER) => self.tags_for(prompt),
            _ => OFFLINE_NOTICE.to_string(),
        }
    }

    fn tags_for(&self, prompt: &str) -> String {
        let fields = TagPromptFields::read(prompt);
        let labels: Vec<&str> = if fields.labels.eq_ignore_ascii_case("none") {
            Vec::new()
        } else {
            fields.labels.split(',').map(str::trim).collect()
        };

        self.taxonomy
            .rule_based_tags(&fields.title, &fields.description, labels, &fields.status)
            .join(", ")
    }
}

impl Default for OfflineGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct TagPromptFields {
    title: String,
    status: String,
    labels: String,
    description: String,
}

impl TagPromptFields {
    fn read(prompt: &str) -> Self {
        let mut fields = Self::default();
        let mut in_description = false;

        for line in prompt.lines() {
            if in_description {
                if line.trim() == "Instructions:" {
                    break;
                }
                fields.description.push('\n');
                fields.description.push_str(line);
            } else if let Some(rest) = line.strip_prefix("Title: ") {
                fields.title = rest.to_string();
            } else if let Some(rest) = line.strip_prefix("Status: ") {
                fields.status = rest.to_string();
            } else if let Some(rest) = line.strip_prefix("Existing labels: ") {
                fields.labels = rest.to_string();
            } else if let Some(rest) = line.strip_prefix("Description: ") {
                fields.description = rest.to_string();
                in_description = true;
            }
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::parser::parse_tags;
    use crate::llm::prompts::{TagRequest, RECOMMENDATION_TASK_MARKER};
    use crate::models::{IssueRecord, IssueState};
    use chrono::Utc;

    #[test]
    fn test_tags_from_tag_prompt() {
        let issue = IssueRecord {
            id: "5".into(),
            number: 5,
            title: "Dark mode button misaligned".into(),
            description: "The layout breaks\nafter the last release.".into(),
            labels: ["ui".to_string(), "Help Wanted".to_string()].into_iter().collect(),
            url: "https://github.com/o/r/issues/5".into(),
            repository: "o/r".into(),
            created_at: Utc::now(),
            closed_at: None,
            state: IssueState::Closed,
        };

        let text = OfflineGenerator::new().generate(&TagRequest::new(&issue).to_prompt());
        let tags = parse_tags(&text);
        assert_eq!(tags, vec!["help-wanted", "ui", "closed"]);
    }

    #[test]
    fn test_other_prompts_get_notice() {
        let generator = OfflineGenerator::new();
        assert_eq!(generator.generate("anything"), OFFLINE_NOTICE);
        assert_eq!(
            generator.generate(&format!("{}\nRepo", RECOMMENDATION_TASK_MARKER)),
            OFFLINE_NOTICE
        );
    }
}
