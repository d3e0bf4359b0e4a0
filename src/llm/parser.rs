use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Priority, Recommendation};
use crate::taxonomy::normalize_tag;

pub const MAX_TAGS: usize = 10;

static RECOMMENDATION_HEADER: Lazy<Option<Regex>> =
    Lazy::new(|| compile(r"(?im)^[\s*#>-]*recommendation\s*#?\s*\d+\s*[*]*\s*[:.)]"));

static TITLE_START: Lazy<Option<Regex>> =
    Lazy::new(|| compile(r"(?im)^[\s*#>-]*(?:\d+[.)])?[\s*]*title[\s*]*:"));

static FIELD_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(concat!(
        r"(?i)^[\s*#>-]*(?:\d+[.)])?[\s*]*",
        r"(title|priority|description|supporting\s+issues?(?:\s+ids?)?)",
        r"[\s*]*:\s*(.*)$",
    ))
});

static ISSUE_REFERENCE: Lazy<Option<Regex>> = Lazy::new(|| compile(r"#(\d+)"));

/// Lines longer than this many words are prose, not tags.
const MAX_TAG_WORDS: usize = 4;

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!("Invalid parser pattern {}: {}", pattern, e);
            None
        }
    }
}

/// Splits a comma- or newline-separated tag list into normalized, unique tags.
pub fn parse_tags(response: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    for line in response.lines() {
        let line = strip_tags_prefix(line);
        // Preambles such as "Here are the tags:" introduce the list.
        if line.ends_with(':') {
            continue;
        }
        for candidate in line.split(',') {
            if candidate.split_whitespace().count() > MAX_TAG_WORDS {
                continue;
            }
            let Some(tag) = normalize_tag(candidate) else {
                continue;
            };
            if seen.insert(tag.clone()) {
                tags.push(tag);
            }
            if tags.len() == MAX_TAGS {
                return tags;
            }
        }
    }

    tags
}

fn strip_tags_prefix(line: &str) -> &str {
    let trimmed = line.trim();
    match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("tags:") => &trimmed[5..],
        _ => trimmed,
    }
}

/// Which strategy produced a recommendation list.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecommendations {
    /// Numbered `RECOMMENDATION n:` blocks.
    Structured(Vec<Recommendation>),
    /// Segments split on `Title:` lines.
    Lenient(Vec<Recommendation>),
    /// Nothing recognizable; one synthetic entry.
    Fallback(Vec<Recommendation>),
}

impl ParsedRecommendations {
    pub fn into_inner(self) -> Vec<Recommendation> {
        match self {
            Self::Structured(r) | Self::Lenient(r) | Self::Fallback(r) => r,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Structured(_) => "structured",
            Self::Lenient(_) => "lenient",
            Self::Fallback(_) => "fallback",
        }
    }
}

/// Never returns an empty list.
pub fn parse_recommendations(response: &str, issue_ids: &[String]) -> ParsedRecommendations {
    let structured = parse_segments(response, RECOMMENDATION_HEADER.as_ref(), true);
    if !structured.is_empty() {
        return ParsedRecommendations::Structured(structured);
    }

    let lenient = parse_segments(response, TITLE_START.as_ref(), false);
    if !lenient.is_empty() {
        return ParsedRecommendations::Lenient(lenient);
    }

    ParsedRecommendations::Fallback(vec![fallback_recommendation(issue_ids)])
}

fn fallback_recommendation(issue_ids: &[String]) -> Recommendation {
    Recommendation {
        title: "Review recent issues".to_string(),
        description: "The generated analysis could not be interpreted. Review the recent issues manually to decide on next steps.".to_string(),
        priority: Priority::Medium,
        supporting_issue_ids: issue_ids.to_vec(),
    }
}

/// Parses every segment that starts at a match of `boundary`. With `skip_boundary`
/// the matched header text is dropped and the rest of its line may carry the title.
fn parse_segments(text: &str, boundary: Option<&Regex>, skip_boundary: bool) -> Vec<Recommendation> {
    let Some(boundary) = boundary else {
        return Vec::new();
    };
    let matches: Vec<_> = boundary.find_iter(text).collect();
    let mut recommendations = Vec::new();

    for (i, m) in matches.iter().enumerate() {
        let start = if skip_boundary { m.end() } else { m.start() };
        let end = matches.get(i + 1).map(|next| next.start()).unwrap_or(text.len());
        if let Some(rec) = parse_block(&text[start..end]) {
            recommendations.push(rec);
        }
    }

    recommendations
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Priority,
    Description,
    Supporting,
}

#[derive(Default)]
struct BlockFields {
    heading: String,
    title: String,
    priority: String,
    description: Vec<String>,
    supporting: Vec<String>,
}

fn parse_block(block: &str) -> Option<Recommendation> {
    let mut fields = BlockFields::default();
    let mut current: Option<Field> = None;

    for (index, line) in block.lines().enumerate() {
        if let Some(caps) = FIELD_LINE.as_ref().and_then(|re| re.captures(line)) {
            let label = caps[1].to_lowercase();
            let value = clean_value(&caps[2]);
            let field = if label.starts_with("title") {
                Field::Title
            } else if label.starts_with("priority") {
                Field::Priority
            } else if label.starts_with("description") {
                Field::Description
            } else {
                Field::Supporting
            };
            match field {
                Field::Title => fields.title = value,
                Field::Priority => fields.priority = value,
                Field::Description => fields.description.push(value),
                Field::Supporting => fields.supporting.push(value),
            }
            current = Some(field);
            continue;
        }

        let value = clean_value(line);
        if value.is_empty() {
            continue;
        }
        match current {
            Some(Field::Description) => fields.description.push(value),
            Some(Field::Supporting) => fields.supporting.push(value),
            None if index == 0 => fields.heading = value,
            _ => {}
        }
    }

    let title = if fields.title.is_empty() {
        fields.heading
    } else {
        fields.title
    };
    if title.is_empty() {
        return None;
    }

    let description = fields
        .description
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Some(Recommendation {
        title,
        description,
        priority: Priority::normalize(&fields.priority),
        supporting_issue_ids: extract_issue_references(&fields.supporting.join(" ")),
    })
}

fn clean_value(raw: &str) -> String {
    raw.trim().trim_matches(|c: char| c == '*' || c == '_').trim().to_string()
}

/// `#<number>` references in order of first appearance.
pub fn extract_issue_references(text: &str) -> Vec<String> {
    let Some(pattern) = ISSUE_REFERENCE.as_ref() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    pattern
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags_comma_and_newline() {
        let tags = parse_tags("**Bug**, Memory Leak\n- performance\nbug, `good first issue`");
        assert_eq!(tags, vec!["bug", "memory-leak", "performance", "good-first-issue"]);
    }

    #[test]
    fn test_parse_tags_caps_at_ten() {
        let response = (0..15).map(|i| format!("tag{}", i)).collect::<Vec<_>>().join(", ");
        assert_eq!(parse_tags(&response).len(), MAX_TAGS);
    }

    #[test]
    fn test_parse_tags_prefix_and_garbage() {
        assert_eq!(parse_tags("Tags: ui, api"), vec!["ui", "api"]);
        assert!(parse_tags(" , ** ,\n\n").is_empty());
    }

    #[test]
    fn test_parse_tags_skips_preamble() {
        assert_eq!(
            parse_tags("Here are the tags for this issue:\nbug, crash, startup"),
            vec!["bug", "crash", "startup"]
        );
        assert_eq!(
            parse_tags("bug, this issue is mostly about the login page, ui"),
            vec!["bug", "ui"]
        );
        assert_eq!(parse_tags("Tags: memory leak"), vec!["memory-leak"]);
    }

    #[test]
    fn test_patterns_compile() {
        assert!(RECOMMENDATION_HEADER.is_some());
        assert!(TITLE_START.is_some());
        assert!(FIELD_LINE.is_some());
        assert!(ISSUE_REFERENCE.is_some());
    }

    #[test]
    fn test_structured_block() {
        let response = "RECOMMENDATION 1:\nTitle: Fix login\nPriority: High\nDescription: Users cannot sign in.\nSupporting Issues: #12, #34";
        let parsed = parse_recommendations(response, &[]);
        assert_eq!(parsed.strategy(), "structured");

        let recs = parsed.into_inner();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].title, "Fix login");
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[0].description, "Users cannot sign in.");
        assert_eq!(recs[0].supporting_issue_ids, vec!["12", "34"]);
    }

    #[test]
    fn test_structured_markdown_blocks() {
        let response = "Here you go:\n\n**RECOMMENDATION 1:**\n**Title:** Stabilize CI\n**Priority:** low\n**Description:** Flaky tests\nslow everyone down.\n**Supporting Issues:** #3\n\n**RECOMMENDATION 2:**\nTitle: Triage\nPriority: urgent\nDescription: Backlog\nSupporting Issues: none";
        let recs = parse_recommendations(response, &[]).into_inner();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].title, "Stabilize CI");
        assert_eq!(recs[0].priority, Priority::Low);
        assert_eq!(recs[0].description, "Flaky tests slow everyone down.");
        assert_eq!(recs[1].priority, Priority::Medium);
        assert!(recs[1].supporting_issue_ids.is_empty());
    }

    #[test]
    fn test_lenient_title_split() {
        let response = "1) Title: Improve docs\nPriority: Medium\nDescription: Add examples\n\nTitle: Cut a release\nSupporting Issues: #9 #9 #10";
        let parsed = parse_recommendations(response, &[]);
        assert_eq!(parsed.strategy(), "lenient");
        let recs = parsed.into_inner();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].title, "Improve docs");
        assert_eq!(recs[0].description, "Add examples");
        assert_eq!(recs[1].title, "Cut a release");
        assert_eq!(recs[1].priority, Priority::Medium);
        assert_eq!(recs[1].supporting_issue_ids, vec!["9", "10"]);
    }

    #[test]
    fn test_unparseable_falls_back() {
        let ids = vec!["1".to_string(), "2".to_string()];
        let parsed = parse_recommendations("I cannot help with that.", &ids);
        assert!(parsed.is_fallback());
        let recs = parsed.into_inner();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].supporting_issue_ids, ids);
    }
}
