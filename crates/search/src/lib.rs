//! Web search for Sage.
//!
//! [`WebSearch`] is the adapter the chat pipeline talks to. It rewrites the
//! query around the assistant's domain keyword, calls a [`SearchProvider`],
//! normalizes the snippets, and never fails: a broken provider degrades to
//! an empty result list.
//!
//! [`SearchProvider`]: sage_core::SearchProvider

pub mod adapter;
pub mod clean;
pub mod duckduckgo;
pub mod format;

pub use adapter::WebSearch;
pub use clean::{clean_text, with_keyword};
pub use duckduckgo::DuckDuckGoSearch;
pub use format::{NO_RESULTS, format_search_results};
