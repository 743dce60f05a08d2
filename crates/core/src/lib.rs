//! # Sage Core
//!
//! Domain types, traits, and error definitions for the Sage assistant.
//! This crate has **no framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! The two external collaborators of the system, the text-completion service
//! and the web search provider, are defined here as traits so the pipeline
//! can be driven by real backends in production and by stubs in tests.

pub mod completion;
pub mod error;
pub mod exchange;
pub mod search;

// Re-export key types at crate root for ergonomics
pub use completion::{Completion, CompletionRequest, CompletionService, SamplingParams, Usage};
pub use error::{CompletionError, Error, LoadError, Result, SearchError, ValidationError};
pub use exchange::Exchange;
pub use search::{SearchProvider, SearchResult};
