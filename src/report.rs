use crate::error::Result;
use crate::models::RepositorySummary;

pub const NO_TAGS: &str = "No tags found";
pub const NO_RECOMMENDATIONS: &str = "No recommendations";

const DISPLAYED_TAGS: usize = 10;

/// Renders a summary as `json`, `markdown`, or plain text (anything else).
pub fn render(summary: &RepositorySummary, format: &str) -> Result<String> {
    Ok(match format {
        "json" => serde_json::to_string_pretty(summary)?,
        "markdown" => format_markdown(summary),
        _ => format_text(summary),
    })
}

pub fn format_text(summary: &RepositorySummary) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n=== Issue Analysis: {} ===\n\n", summary.repository));
    output.push_str(&format!(
        "Issues: {} ({} open, {} closed)\n",
        summary.total_issues, summary.open_count, summary.closed_count
    ));

    output.push_str("\nTop Tags:\n");
    if summary.top_tags.is_empty() {
        output.push_str(&format!("  {}\n", NO_TAGS));
    }
    for stat in summary.top_tags.iter().take(DISPLAYED_TAGS) {
        output.push_str(&format!(
            "  - {}: {} ({:.1}%)\n",
            stat.tag, stat.count, stat.percentage
        ));
    }

    output.push_str("\nRecommendations:\n");
    if summary.recommendations.is_empty() {
        output.push_str(&format!("  {}\n", NO_RECOMMENDATIONS));
    }
    for (i, rec) in summary.recommendations.iter().enumerate() {
        output.push_str(&format!("  {}. [{}] {}\n", i + 1, rec.priority, rec.title));
        if !rec.description.is_empty() {
            output.push_str(&format!("     {}\n", rec.description));
        }
        if !rec.supporting_issue_ids.is_empty() {
            output.push_str(&format!(
                "     Issues: {}\n",
                format_issue_refs(&rec.supporting_issue_ids)
            ));
        }
    }

    output.push_str(&format!("\nActivity ({}):\n", summary.granularity));
    for range in &summary.time_ranges {
        output.push_str(&format!(
            "  {} - {}: {} created, {} closed\n",
            range.start_date.format("%Y-%m-%d"),
            range.end_date.format("%Y-%m-%d"),
            range.issues_created,
            range.issues_closed
        ));
    }

    output.push_str(&format!(
        "\nGenerated on: {}\n",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}

pub fn format_markdown(summary: &RepositorySummary) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Issue Analysis: {}\n\n", summary.repository));
    output.push_str("| Metric | Value |\n|--------|-------|\n");
    output.push_str(&format!("| Total Issues | {} |\n", summary.total_issues));
    output.push_str(&format!("| Open | {} |\n", summary.open_count));
    output.push_str(&format!("| Closed | {} |\n", summary.closed_count));

    output.push_str("\n## Top Tags\n\n");
    if summary.top_tags.is_empty() {
        output.push_str(&format!("_{}_\n", NO_TAGS));
    } else {
        output.push_str("| Tag | Count | Share |\n|-----|-------|-------|\n");
        for stat in summary.top_tags.iter().take(DISPLAYED_TAGS) {
            output.push_str(&format!(
                "| {} | {} | {:.1}% |\n",
                stat.tag, stat.count, stat.percentage
            ));
        }
    }

    output.push_str("\n## Recommendations\n\n");
    if summary.recommendations.is_empty() {
        output.push_str(&format!("_{}_\n", NO_RECOMMENDATIONS));
    }
    for rec in &summary.recommendations {
        output.push_str(&format!("### {} ({})\n\n", rec.title, rec.priority));
        if !rec.description.is_empty() {
            output.push_str(&format!("{}\n\n", rec.description));
        }
        if !rec.supporting_issue_ids.is_empty() {
            output.push_str(&format!(
                "Supporting issues: {}\n\n",
                format_issue_refs(&rec.supporting_issue_ids)
            ));
        }
    }

    output.push_str(&format!("\n## Activity ({})\n\n", summary.granularity));
    output.push_str("| From | To | Created | Closed |\n|------|----|---------|--------|\n");
    for range in &summary.time_ranges {
        output.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            range.start_date.format("%Y-%m-%d"),
            range.end_date.format("%Y-%m-%d"),
            range.issues_created,
            range.issues_closed
        ));
    }

    output.push_str(&format!(
        "\n---\n*Generated on {}*\n",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}

fn format_issue_refs(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("#{}", id))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, RangeGranularity, Recommendation, TagStatistic};
    use chrono::Utc;

    fn summary() -> RepositorySummary {
        RepositorySummary {
            repository: "o/r".into(),
            generated_at: Utc::now(),
            total_issues: 0,
            open_count: 0,
            closed_count: 0,
            top_tags: Vec::new(),
            recommendations: Vec::new(),
            granularity: RangeGranularity::Daily,
            time_ranges: Vec::new(),
        }
    }

    #[test]
    fn test_placeholders_for_empty_sections() {
        let text = format_text(&summary());
        assert!(text.contains(NO_TAGS));
        assert!(text.contains(NO_RECOMMENDATIONS));

        let markdown = format_markdown(&summary());
        assert!(markdown.contains("_No tags found_"));
        assert!(markdown.contains("_No recommendations_"));
    }

    #[test]
    fn test_renders_tags_and_recommendations() {
        let mut s = summary();
        s.top_tags.push(TagStatistic {
            tag: "bug".into(),
            count: 3,
            percentage: 75.0,
        });
        s.recommendations.push(Recommendation {
            title: "Fix login".into(),
            description: "Users are locked out".into(),
            priority: Priority::High,
            supporting_issue_ids: vec!["12".into(), "34".into()],
        });

        let text = format_text(&s);
        assert!(text.contains("- bug: 3 (75.0%)"));
        assert!(text.contains("1. [High] Fix login"));
        assert!(text.contains("Issues: #12, #34"));
        assert!(!text.contains(NO_TAGS));

        let json = render(&s, "json").unwrap();
        assert!(json.contains("\"Fix login\""));
    }
}
