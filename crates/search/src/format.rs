//! Renders search results into the block embedded in the prompt.

use sage_core::SearchResult;
use std::fmt::Write;

/// Sentinel used in place of the results block when nothing was found.
pub const NO_RESULTS: &str = "No search results found.";

/// Render results as a numbered list, or [`NO_RESULTS`] when empty.
pub fn format_search_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut out = String::from("Here's what I found from recent web searches:\n\n");
    for (i, result) in results.iter().enumerate() {
        let _ = write!(out, "{}. {}\n   {}\n\n", i + 1, result.title, result.snippet);
    }
    out
}
