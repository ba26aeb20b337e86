//! Process-name allowlist.
//!
//! The same filter restricts process snapshots and acts as the final safety
//! rail before any termination: a target whose command line contains none of
//! the terms is never killed.

use serde::{Deserialize, Serialize};

/// Case-insensitive substring allowlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ProcessFilter {
    terms: Vec<String>,
    lowered: Vec<String>,
}

impl ProcessFilter {
    /// Build from individual terms. Blank terms are dropped.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let lowered = terms.iter().map(|t| t.to_lowercase()).collect();
        Self { terms, lowered }
    }

    /// Parse the semicolon-delimited CLI form, e.g. `"node; vite;esbuild"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(';'))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// True when `text` contains any term, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.lowered.iter().any(|term| haystack.contains(term.as_str()))
    }
}

impl From<Vec<String>> for ProcessFilter {
    fn from(terms: Vec<String>) -> Self {
        Self::new(terms)
    }
}

impl From<ProcessFilter> for Vec<String> {
    fn from(filter: ProcessFilter) -> Self {
        filter.terms
    }
}

impl std::fmt::Display for ProcessFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.terms.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_semicolon_list() {
        let filter = ProcessFilter::parse(" node; vite ;;esbuild;");
        assert_eq!(filter.terms(), &["node", "vite", "esbuild"]);
    }

    #[test]
    fn blank_list_is_empty() {
        assert!(ProcessFilter::parse(" ; ;").is_empty());
        assert!(ProcessFilter::parse("").is_empty());
    }

    #[test]
    fn matches_case_insensitive_substring() {
        let filter = ProcessFilter::parse("Node;vite");
        assert!(filter.matches("C:\\Program Files\\nodejs\\NODE.EXE server.js"));
        assert!(filter.matches("/home/dev/app/node_modules/.bin/vite --port 5173"));
        assert!(!filter.matches("/usr/sbin/sshd -D"));
    }

    #[test]
    fn serde_round_trips_as_list() {
        let filter = ProcessFilter::parse("node;vite");
        let json = serde_json::to_string(&filter).unwrap();
        assert_eq!(json, r#"["node","vite"]"#);
        let back: ProcessFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn display_joins_with_semicolons() {
        assert_eq!(ProcessFilter::parse("a;b").to_string(), "a;b");
    }
}
