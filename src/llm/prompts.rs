use crate::models::IssueRecord;

pub const SYSTEM_PROMPT: &str = r#"You are an experienced open-source maintainer triaging GitHub issues.
Answer exactly in the format requested by the user message, without preamble or closing remarks."#;

/// First line of every tagging prompt.
pub const TAG_TASK_MARKER: &str = "TASK: issue-tags";
/// First line of every recommendation prompt.
pub const RECOMMENDATION_TASK_MARKER: &str = "TASK: repository-recommendations";

pub const RECOMMENDATION_COUNT: usize = 3;
pub const MAX_PROMPT_ISSUES: usize = 15;

const MAX_DESCRIPTION_CHARS: usize = 2000;
const MAX_SUMMARY_DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct TagRequest<'a> {
    pub issue: &'a IssueRecord,
}

impl<'a> TagRequest<'a> {
    pub fn new(issue: &'a IssueRecord) -> Self {
        Self { issue }
    }

    pub fn to_prompt(&self) -> String {
        let issue = self.issue;
        let labels = if issue.labels.is_empty() {
            "none".to_string()
        } else {
            issue.labels.iter().cloned().collect::<Vec<_>>().join(", ")
        };

        let mut prompt = format!("{}\n", TAG_TASK_MARKER);
        prompt.push_str("Suggest tags for the following GitHub issue.\n\n");
        prompt.push_str(&format!("Title: {}\n", issue.title));
        prompt.push_str(&format!("Status: {}\n", issue.state));
        prompt.push_str(&format!("Existing labels: {}\n", labels));
        prompt.push_str(&format!(
            "Description: {}\n\n",
            truncate(&issue.description, MAX_DESCRIPTION_CHARS)
        ));
        prompt.push_str("Instructions:\n");
        prompt.push_str("- Return between 5 and 10 tags as a single comma-separated line\n");
        prompt.push_str("- Use lowercase words joined by hyphens (e.g. memory-leak, good-first-issue)\n");
        prompt.push_str("- Cover the issue type, the affected component and the severity\n");
        prompt.push_str("- Do not number the tags or add any explanation\n");
        prompt
    }
}

#[derive(Debug, Clone)]
pub struct RecommendationRequest<'a> {
    pub repository: &'a str,
    pub issues: Vec<&'a IssueRecord>,
}

impl<'a> RecommendationRequest<'a> {
    /// Keeps the `MAX_PROMPT_ISSUES` most recently created issues.
    pub fn new(repository: &'a str, issues: impl IntoIterator<Item = &'a IssueRecord>) -> Self {
        let mut issues: Vec<&IssueRecord> = issues.into_iter().collect();
        issues.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        issues.truncate(MAX_PROMPT_ISSUES);
        Self { repository, issues }
    }

    pub fn issue_ids(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.id.clone()).collect()
    }

    pub fn to_prompt(&self) -> String {
        let mut prompt = format!("{}\n", RECOMMENDATION_TASK_MARKER);
        prompt.push_str(&format!(
            "Review the {} most recent issues of repository '{}' and suggest {} prioritized actions for the maintainers.\n\n",
            self.issues.len(),
            self.repository,
            RECOMMENDATION_COUNT
        ));

        for issue in &self.issues {
            prompt.push_str(&format!("#{} [{}] {}\n", issue.id, issue.state, issue.title));
            let description = truncate(&issue.description, MAX_SUMMARY_DESCRIPTION_CHARS);
            if !description.trim().is_empty() {
                prompt.push_str(&format!("  {}\n", description.replace('\n', " ")));
            }
        }

        prompt.push_str(&format!(
            "\nRespond with exactly {} blocks in this format:\n\n",
            RECOMMENDATION_COUNT
        ));
        prompt.push_str("RECOMMENDATION 1:\n");
        prompt.push_str("Title: <short action title>\n");
        prompt.push_str("Priority: <High|Medium|Low>\n");
        prompt.push_str("Description: <one or two sentences>\n");
        prompt.push_str("Supporting Issues: <issue references such as #12, #34>\n");
        prompt
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}
