//! Empirically tuned rules for telling user-reported issues apart from
//! pull-request traffic and automation. They are biased toward precision on
//! typical GitHub repositories and are not exhaustive.

use crate::models::{GitHubIssue, IssueRecord, StateFilter};

/// Title fragments that mark automation or pull-request style items.
pub const PR_TITLE_KEYWORDS: &[&str] = &[
    "merge pull request",
    "merge branch",
    "[wip]",
    "wip:",
    "chore(deps)",
    "build(deps)",
    "bump ",
    "update dependency",
    "dependabot",
    "renovate",
    "release v",
    "revert \"",
];

/// Title/description words that make an issue worth keeping when results are trimmed.
pub const INTERESTING_KEYWORDS: &[&str] = &[
    "bug",
    "error",
    "crash",
    "fail",
    "broken",
    "exception",
    "panic",
    "regression",
    "security",
    "vulnerab",
    "leak",
    "incorrect",
    "unexpected",
    "hang",
];

pub fn looks_like_pull_request_title(title: &str) -> bool {
    let lower = title.trim().to_lowercase();
    lower.starts_with("wip ")
        || lower.starts_with("chore:")
        || PR_TITLE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Accepts raw tracker payloads that are plausibly genuine issues.
pub fn is_genuine_issue(issue: &GitHubIssue) -> bool {
    !issue.is_pull_request() && !looks_like_pull_request_title(&issue.title)
}

/// Whether `login` opened the issue. Unknown authors never match.
pub fn is_authored_by(issue: &GitHubIssue, login: &str) -> bool {
    issue
        .user
        .as_ref()
        .is_some_and(|user| user.login.eq_ignore_ascii_case(login))
}

/// Higher is more interesting; PR-looking titles are pushed below everything else.
pub fn interest_score(issue: &IssueRecord) -> i32 {
    let title = issue.title.to_lowercase();
    let description = issue.description.to_lowercase();

    let mut score: i32 = INTERESTING_KEYWORDS
        .iter()
        .map(|kw| {
            let mut hits = 0;
            if title.contains(kw) {
                hits += 2;
            }
            if description.contains(kw) {
                hits += 1;
            }
            hits
        })
        .sum();

    if looks_like_pull_request_title(&issue.title) {
        score -= 100;
    }
    score
}

fn state_qualifier(state: StateFilter) -> &'static str {
    match state {
        StateFilter::Open => " is:open",
        StateFilter::Closed => " is:closed",
        StateFilter::All => "",
    }
}

/// Broad query biased toward user-reported issues.
pub fn general_search_query(owner: &str, repo: &str, state: StateFilter) -> String {
    format!(
        "repo:{}/{} is:issue{} -author:{} -author:app/dependabot -author:app/renovate NOT bump NOT dependabot",
        owner,
        repo,
        state_qualifier(state),
        owner
    )
}

/// Narrower query used when a single closed issue is requested.
pub fn closed_single_query(owner: &str, repo: &str) -> String {
    format!(
        "repo:{}/{} is:issue is:closed -author:{} -author:app/dependabot -label:duplicate -label:invalid",
        owner, repo, owner
    )
}

/// Query that should return `title`'s issue again if it really is an issue.
pub fn confirmation_query(owner: &str, repo: &str, state: StateFilter, title: &str) -> String {
    let phrase: String = title
        .chars()
        .filter(|c| *c != '"' && *c != '\\')
        .take(100)
        .collect();
    format!(
        "repo:{}/{} is:issue{} \"{}\" in:title",
        owner,
        repo,
        state_qualifier(state),
        phrase.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueState;
    use chrono::Utc;

    fn record(title: &str, description: &str) -> IssueRecord {
        IssueRecord {
            id: "1".into(),
            number: 1,
            title: title.into(),
            description: description.into(),
            labels: Default::default(),
            url: String::new(),
            repository: "o/r".into(),
            created_at: Utc::now(),
            closed_at: None,
            state: IssueState::Open,
        }
    }

    #[test]
    fn test_pull_request_titles() {
        assert!(looks_like_pull_request_title("Bump serde from 1.0.1 to 1.0.2"));
        assert!(looks_like_pull_request_title("Merge pull request #4 from fork/main"));
        assert!(looks_like_pull_request_title("chore(deps): update rust crate tokio"));
        assert!(looks_like_pull_request_title("WIP: new parser"));
        assert!(!looks_like_pull_request_title("App crashes when opening settings"));
        assert!(!looks_like_pull_request_title("Wipe cache on logout"));
    }

    #[test]
    fn test_interest_score_orders_bugs_first() {
        let crash = record("Crash on startup", "panic in main thread");
        let question = record("How do I configure logging?", "");
        let bump = record("Bump tokio to 1.40", "error");
        assert!(interest_score(&crash) > interest_score(&question));
        assert!(interest_score(&question) > interest_score(&bump));
    }

    #[test]
    fn test_queries() {
        let q = general_search_query("acme", "widgets", StateFilter::Open);
        assert!(q.starts_with("repo:acme/widgets is:issue is:open"));
        assert!(q.contains("-author:acme"));

        let q = confirmation_query("acme", "widgets", StateFilter::Closed, "Broken \"quote\"");
        assert_eq!(q, "repo:acme/widgets is:issue is:closed \"Broken quote\" in:title");
    }

    #[test]
    fn test_is_authored_by() {
        let mut issue: GitHubIssue = serde_json::from_value(serde_json::json!({
            "number": 3,
            "title": "Crash on exit",
            "state": "closed",
            "html_url": "https://github.com/acme/widgets/issues/3",
            "created_at": "2024-03-01T00:00:00Z",
            "user": {"login": "Acme"}
        }))
        .unwrap();
        assert!(is_authored_by(&issue, "acme"));
        assert!(!is_authored_by(&issue, "someone"));

        issue.user = None;
        assert!(!is_authored_by(&issue, "acme"));
    }
}
