//! Conversation exchange: one user message paired with the assistant's reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single completed turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// What the user said
    pub user: String,

    /// What the assistant replied
    pub assistant: String,

    /// When the reply was produced
    pub at: DateTime<Utc>,
}

impl Exchange {
    /// Create an exchange stamped with the current time.
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_serializes_both_sides() {
        let ex = Exchange::new("What is S/4HANA?", "SAP's current ERP suite.");
        let json = serde_json::to_value(&ex).unwrap();
        assert_eq!(json["user"], "What is S/4HANA?");
        assert_eq!(json["assistant"], "SAP's current ERP suite.");
        assert!(json["at"].is_string());
    }
}
