//! Prompt assembly.
//!
//! The layout below is what the chat model was tuned against: TinyLlama chat
//! markup, a fixed instruction block, the knowledge base, the search block,
//! prior turns oldest first, then the user message and a priming suffix.
//! Changing the wording or order changes the model's behavior.

use crate::greeting::is_greeting;
use sage_core::{Exchange, SearchResult};
use sage_search::format_search_results;

/// Text the assistant's reply is primed with.
pub const PRIMING_SUFFIX: &str = "Based on the available information, ";

/// Builds prompts for one assistant persona.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    domain: String,
}

impl PromptAssembler {
    /// `domain` names the subject the assistant specializes in (e.g. "SAP").
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    /// Assemble the full prompt for one turn.
    pub fn build_prompt(
        &self,
        user_input: &str,
        knowledge: &str,
        results: &[SearchResult],
        history: &[Exchange],
    ) -> String {
        let web_info = if results.is_empty() {
            String::new()
        } else {
            format_search_results(results)
        };
        let system = self.system_block(knowledge, &web_info);
        let history = render_history(history);

        let mut user = user_input.to_string();
        if is_greeting(user_input) {
            user.push_str(&self.greeting_instruction());
        }

        format!("<|system|>\n{system}{history}\n<|user|>\n{user}\n<|assistant|>\n{PRIMING_SUFFIX}")
    }

    /// Inline tag appended to greeting messages.
    pub fn greeting_instruction(&self) -> String {
        format!(
            "\n(This message is a greeting. Respond warmly, introduce yourself as the {d} AI \
             assistant, and briefly mention the {d} topics you can help with.)",
            d = self.domain
        )
    }

    fn system_block(&self, knowledge: &str, web_info: &str) -> String {
        let d = &self.domain;
        format!(
            "You are an AI assistant specialized in {d}. Use the following knowledge base and web search results to help answer questions:

KNOWLEDGE BASE:
{knowledge}

WEB SEARCH RESULTS:
{web_info}

IMPORTANT INSTRUCTIONS:
1. First, use information from the knowledge base if available
2. If the knowledge base doesn't have the information:
   - Use relevant web search results if available
   - Clearly indicate when you're using web-sourced information
   - Be transparent about the source of information
3. If neither knowledge base nor web search has the information:
   - Clearly state that you don't have access to this information
   - Do not make assumptions or guesses
   - Suggest topics you can help with instead
4. Be precise and technical when discussing {d} topics
5. Explain {d}-specific terms when using them
6. Stay within your knowledge boundaries
7. Never make up information

Remember: Honesty about limitations is better than providing uncertain information."
        )
    }
}

/// Prior turns as alternating "User:"/"Assistant:" lines, oldest first.
/// Empty when there is no history.
fn render_history(history: &[Exchange]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let lines = history
        .iter()
        .map(|ex| format!("User: {}\nAssistant: {}", ex.user, ex.assistant))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\nPrevious conversation:\n{lines}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_search::NO_RESULTS;

    fn assembler() -> PromptAssembler {
        PromptAssembler::new("SAP")
    }

    #[test]
    fn sections_appear_in_order() {
        let results = vec![SearchResult::new("BTP docs", "Platform overview.")];
        let history = vec![Exchange::new("What is ABAP?", "A programming language.")];
        let prompt = assembler().build_prompt("And Fiori?", "KB TEXT", &results, &history);

        let order = [
            "<|system|>\nYou are an AI assistant specialized in SAP.",
            "KNOWLEDGE BASE:\nKB TEXT",
            "WEB SEARCH RESULTS:\nHere's what I found",
            "1. BTP docs",
            "IMPORTANT INSTRUCTIONS:",
            "Remember: Honesty",
            "\nPrevious conversation:\nUser: What is ABAP?\nAssistant: A programming language.\n",
            "<|user|>\nAnd Fiori?\n<|assistant|>\n",
        ];
        let mut cursor = 0;
        for part in order {
            let found = prompt[cursor..].find(part);
            assert!(found.is_some(), "missing or out of order: {part:?}");
            cursor += found.unwrap_or(0) + part.len();
        }
        assert!(prompt.ends_with("<|assistant|>\nBased on the available information, "));
    }

    #[test]
    fn no_history_means_no_history_section() {
        let prompt = assembler().build_prompt("What is SAP?", "", &[], &[]);
        assert!(!prompt.contains("Previous conversation"));
        assert!(prompt.contains("information.\n<|user|>\nWhat is SAP?\n"));
    }

    #[test]
    fn empty_search_leaves_section_blank() {
        let prompt = assembler().build_prompt("What is SAP?", "", &[], &[]);
        assert!(prompt.contains("WEB SEARCH RESULTS:\n\n\nIMPORTANT INSTRUCTIONS:"));
        assert!(!prompt.contains(NO_RESULTS));
    }

    #[test]
    fn history_is_oldest_first() {
        let history = vec![Exchange::new("q1", "a1"), Exchange::new("q2", "a2")];
        let prompt = assembler().build_prompt("q3", "", &[], &history);
        assert!(prompt.contains("User: q1\nAssistant: a1\nUser: q2\nAssistant: a2\n"));
    }

    #[test]
    fn greeting_gets_tagged() {
        let a = assembler();
        let prompt = a.build_prompt("Hello", "", &[], &[]);
        let tagged = format!("<|user|>\nHello{}\n<|assistant|>", a.greeting_instruction());
        assert!(prompt.contains(&tagged));
        assert!(prompt.contains("introduce yourself as the SAP AI assistant"));
    }

    #[test]
    fn non_greeting_is_not_tagged() {
        let prompt = assembler().build_prompt("What is BTP?", "", &[], &[]);
        assert!(!prompt.contains("This message is a greeting"));
    }

    #[test]
    fn domain_is_substituted() {
        let prompt = PromptAssembler::new("Kubernetes").build_prompt("pods?", "", &[], &[]);
        assert!(prompt.contains("specialized in Kubernetes"));
        assert!(prompt.contains("5. Explain Kubernetes-specific terms"));
        assert!(!prompt.contains("SAP"));
    }
}
