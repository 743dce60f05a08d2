//! Snippet normalization and query rewriting.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static URLS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"http\S+|www\.\S+").ok());

/// Normalize search text: drop URLs, collapse whitespace runs to one space, trim.
///
/// URLs go first so removing one never leaves a double space behind.
pub fn clean_text(text: &str) -> String {
    let without_urls = match URLS.as_ref() {
        Some(re) => re.replace_all(text, ""),
        None => Cow::Borrowed(text),
    };
    without_urls.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Make sure `query` mentions `keyword`, prefixing it when absent.
pub fn with_keyword(query: &str, keyword: &str) -> String {
    let query = query.trim();
    if keyword.is_empty() || query.to_lowercase().contains(&keyword.to_lowercase()) {
        query.to_string()
    } else {
        format!("{keyword} {query}")
    }
}
