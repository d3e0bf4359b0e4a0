use std::collections::HashMap;

/// Appended when rule-based extraction finds fewer than `MIN_RULE_BASED_TAGS`.
pub const GENERIC_TRIAGE_TAGS: [&str; 3] = ["needs-triage", "community-reported", "general"];
pub const MIN_RULE_BASED_TAGS: usize = 3;
const MAX_RULE_BASED_TAGS: usize = 10;

/// Keyword categories used when tags have to be derived without a model.
pub struct TagTaxonomy {
    categories: Vec<(String, Vec<String>)>,
    aliases: HashMap<String, String>,
}

impl TagTaxonomy {
    pub fn new() -> Self {
        let mut taxonomy = Self {
            categories: Vec::new(),
            aliases: HashMap::new(),
        };

        taxonomy.init_categories();
        taxonomy.init_aliases();

        taxonomy
    }

    fn init_categories(&mut self) {
        let categories = vec![
            (
                "security",
                vec!["security", "vulnerab", "xss", "csrf", "injection", "cve-", "exploit"],
            ),
            (
                "performance",
                vec!["performance", "slow", "latency", "memory leak", "cpu usage", "optimiz"],
            ),
            (
                "bug",
                vec!["bug", "error", "crash", "fail", "broken", "exception", "panic", "incorrect"],
            ),
            (
                "enhancement",
                vec!["feature", "enhancement", "add support", "improve", "proposal", "would be nice"],
            ),
            (
                "documentation",
                vec!["documentation", "docs", "readme", "typo", "tutorial", "example"],
            ),
            (
                "authentication",
                vec!["authentication", "login", "log in", "oauth", "password", "sso", "sign in"],
            ),
            // Domain categories
            ("ui", vec!["ui ", "button", "layout", "css", "dark mode", "render"]),
            ("api", vec!["api", "endpoint", "graphql", "rest "]),
            ("database", vec!["database", "sql", "query", "migration", "postgres", "mysql", "sqlite"]),
            ("testing", vec!["test", "flaky", "coverage"]),
            ("build", vec!["build", "compile", "dependency", "install", "packaging"]),
            ("networking", vec!["network", "timeout", "connection", "proxy", "dns", "tls"]),
        ];

        for (tag, keywords) in categories {
            self.categories.push((
                tag.to_string(),
                keywords.into_iter().map(str::to_string).collect(),
            ));
        }
    }

    fn init_aliases(&mut self) {
        let aliases = [
            ("bugs", "bug"),
            ("type-bug", "bug"),
            ("kind-bug", "bug"),
            ("feature", "enhancement"),
            ("feature-request", "enhancement"),
            ("type-feature", "enhancement"),
            ("docs", "documentation"),
            ("doc", "documentation"),
            ("perf", "performance"),
            ("auth", "authentication"),
        ];

        for (alias, canonical) in aliases {
            self.aliases.insert(alias.to_string(), canonical.to_string());
        }
    }

    /// Categories whose keywords occur in `text`, matched case-insensitively,
    /// in taxonomy order.
    pub fn categorize(&self, text: &str) -> Vec<String> {
        let haystack = format!(" {} ", text.to_lowercase());
        self.categories
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|kw| haystack.contains(kw.as_str())))
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    /// Labels, then the status, then keyword categories, topped up with generic
    /// triage tags. Never empty.
    pub fn rule_based_tags<'a>(
        &self,
        title: &str,
        description: &str,
        labels: impl IntoIterator<Item = &'a str>,
        status: &str,
    ) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();

        for label in labels {
            push_unique(&mut tags, self.canonical_tag(label));
        }
        push_unique(&mut tags, normalize_tag(status));
        for category in self.categorize(&format!("{} {}", title, description)) {
            push_unique(&mut tags, Some(category));
        }
        if tags.len() < MIN_RULE_BASED_TAGS {
            for generic in GENERIC_TRIAGE_TAGS {
                push_unique(&mut tags, Some(generic.to_string()));
            }
        }

        tags.truncate(MAX_RULE_BASED_TAGS);
        tags
    }

    /// Normalizes a tag and folds well-known aliases onto one spelling.
    pub fn canonical_tag(&self, raw: &str) -> Option<String> {
        let tag = normalize_tag(raw)?;
        Some(self.aliases.get(&tag).cloned().unwrap_or(tag))
    }
}

impl Default for TagTaxonomy {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase, hyphenated, markdown-free form of a tag; `None` when nothing is left.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '#' | '"' | '\'' | '[' | ']'))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches(['-', '+', '•']).trim();
    let cleaned = strip_list_number(cleaned).to_lowercase();

    let mut tag = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if c.is_alphanumeric() {
            tag.push(c);
        } else if (c.is_whitespace() || c == '-' || c == '/' || c == ':') && !tag.ends_with('-') {
            tag.push('-');
        }
    }
    let tag = tag.trim_matches('-').to_string();

    if tag.is_empty() || tag.len() > 40 {
        None
    } else {
        Some(tag)
    }
}

fn push_unique(tags: &mut Vec<String>, tag: Option<String>) {
    if let Some(tag) = tag {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
}

/// Drops a leading "3." or "3)" list marker.
fn strip_list_number(text: &str) -> &str {
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    match text[digits..].chars().next() {
        Some('.') | Some(')') if digits > 0 => text[digits + 1..].trim_start(),
        _ => text,
    }
}
