//! Greeting detection.

use regex::Regex;
use std::sync::LazyLock;

static GREETING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(hello|hi|hey|greetings|good morning|good afternoon|good evening)\b").ok()
});

/// True when the lowercased message contains a greeting as a whole word.
///
/// "Hi there" is a greeting; "hiya" and "this" are not. Word boundaries are
/// Unicode-aware, so "éhi" is not a greeting either.
pub fn is_greeting(message: &str) -> bool {
    GREETING
        .as_ref()
        .is_some_and(|re| re.is_match(&message.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_compiles() {
        assert!(GREETING.is_some());
    }

    #[test]
    fn whole_word_greetings_match() {
        for msg in [
            "Hello",
            "hi",
            "Hey, what is SAP?",
            "Greetings!",
            "GOOD MORNING team",
            "well, good afternoon",
            "Good evening.",
        ] {
            assert!(is_greeting(msg), "{msg:?} should be a greeting");
        }
    }

    #[test]
    fn substrings_do_not_match() {
        for msg in [
            "hiya",
            "this is a question",
            "they said",
            "shello",
            "good mornings",
            "éhi",
            "naïhey",
            "hiñ",
        ] {
            assert!(!is_greeting(msg), "{msg:?} should not be a greeting");
        }
    }

    #[test]
    fn greeting_next_to_non_ascii_punctuation_matches() {
        assert!(is_greeting("¡hola! hi"));
        assert!(is_greeting("«hello»"));
    }

    #[test]
    fn empty_message_is_not_a_greeting() {
        assert!(!is_greeting(""));
    }
}
