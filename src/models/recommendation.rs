use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Anything that does not read as high or low is medium, including empty text.
    pub fn normalize(raw: &str) -> Self {
        let cleaned = raw
            .trim()
            .trim_matches(|c: char| c == '*' || c == '_' || c == '`' || c.is_whitespace())
            .to_lowercase();
        if cleaned.starts_with("high") {
            Priority::High
        } else if cleaned.starts_with("low") {
            Priority::Low
        } else {
            Priority::Medium
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub supporting_issue_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_normalize() {
        assert_eq!(Priority::normalize("High"), Priority::High);
        assert_eq!(Priority::normalize("**LOW**"), Priority::Low);
        assert_eq!(Priority::normalize(" high - urgent"), Priority::High);
        assert_eq!(Priority::normalize("critical"), Priority::Medium);
        assert_eq!(Priority::normalize(""), Priority::Medium);
    }
}
