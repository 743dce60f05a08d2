//! Text-completion backends for Sage.
//!
//! All backends implement the `sage_core::CompletionService` trait.
//! The router builds the configured backend from `AppConfig`.

#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod router;

#[cfg(feature = "local")]
pub use local::LocalCompletion;
pub use openai_compat::OpenAiCompatCompletion;
pub use router::build_from_config;

/// End-of-sequence markers some servers leave in the generated text.
const TRAILING_MARKERS: &[&str] = &["</s>", "<|im_end|>", "<|eot_id|>", "<|endoftext|>"];

/// Turn raw model output into the assistant's reply.
///
/// Drops an echoed copy of the prompt (some servers return prompt + continuation),
/// trailing end-of-sequence markers, and surrounding whitespace.
pub fn clean_completion(prompt: &str, text: &str) -> String {
    let mut out = if !prompt.is_empty() && text.contains(prompt) {
        text.replace(prompt, "")
    } else {
        text.to_string()
    };

    loop {
        let trimmed = out.trim_end();
        match TRAILING_MARKERS.iter().find(|m| trimmed.ends_with(**m)) {
            Some(marker) => {
                let cut = trimmed.len() - marker.len();
                out.truncate(cut);
            }
            None => break,
        }
    }

    out.trim().to_string()
}
