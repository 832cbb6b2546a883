//! Topic extraction for momentum boosts.
//!
//! Pulls code-flavoured tokens out of free text: camelCase and PascalCase
//! identifiers, snake_case identifiers, words with common technical suffixes,
//! file names with extensions, and quoted phrases.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Default cap on extracted topics.
pub const DEFAULT_MAX_TOPICS: usize = 10;

/// Longest normalized topic key, in characters.
pub const MAX_TOPIC_CHARS: usize = 100;

// Whole-match patterns, applied in order
static TOKEN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // camelCase
        Regex::new(r"\b[a-z][a-z0-9]*(?:[A-Z][a-z0-9]+)+\b").unwrap(),
        // PascalCase (two or more humps)
        Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]+)+\b").unwrap(),
        // snake_case
        Regex::new(r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b").unwrap(),
        // technical suffixes
        Regex::new(
            r"\b[A-Za-z][A-Za-z0-9]*(?:Service|Controller|Handler|Manager|Provider|Factory|Repository|Store|Client|Server|Config|Module|Component|Middleware|Router|Schema|Model|Hook|Util|Helper)\b",
        )
        .unwrap(),
        // file names
        Regex::new(
            r"\b[\w-]+\.(?:rs|ts|tsx|js|jsx|mjs|py|go|java|kt|rb|c|h|cpp|hpp|cs|swift|sql|toml|json|yaml|yml|md|sh|css|scss|html|vue|svelte)\b",
        )
        .unwrap(),
    ]
});

// Quoted phrases, captured without the quotes
static QUOTED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'`]([^"'`\n]{3,50})["'`]"#).unwrap());

/// Normalize a topic into its boost key: trimmed, lowercase, at most 100 chars.
pub fn normalize_topic(topic: &str) -> String {
    topic
        .trim()
        .to_lowercase()
        .chars()
        .take(MAX_TOPIC_CHARS)
        .collect()
}

/// Extract up to `max_topics` distinct topics from `text`.
///
/// Topics keep their original spelling; duplicates are detected on the
/// normalized key.
pub fn extract_topics(text: &str, max_topics: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut topics = Vec::new();

    let matches = TOKEN_PATTERNS
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.as_str()))
        .chain(
            QUOTED_PATTERN
                .captures_iter(text)
                .filter_map(|c| c.get(1).map(|m| m.as_str())),
        );

    for candidate in matches {
        if topics.len() >= max_topics {
            break;
        }
        let candidate = candidate.trim();
        let key = normalize_topic(candidate);
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        topics.push(candidate.to_string());
    }

    topics
}
