use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Upper bound on persisted message content, in characters.
pub const MAX_MESSAGE_CHARS: usize = 50_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub thread_id: ObjectId,
    pub role: MessageRole,
    pub content: String,
    pub model: String,
    /// Reasoning trace from reasoning-capable models, stored alongside the
    /// answer text, never instead of it.
    pub reasoning: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [MessageRole::User, MessageRole::Assistant, MessageRole::System] {
            assert_eq!(MessageRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::parse("tool"), None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_message_serializes_optional_reasoning() {
        let message = StoredMessage {
            id: ObjectId::new(),
            thread_id: ObjectId::new(),
            role: MessageRole::Assistant,
            content: "answer".to_string(),
            model: "openai/o1-mini".to_string(),
            reasoning: Some("trace".to_string()),
            created_at: Utc::now(),
        };

        let doc = bson::to_document(&message).unwrap();
        assert_eq!(doc.get_str("reasoning").unwrap(), "trace");
        assert_eq!(doc.get_str("role").unwrap(), "assistant");
    }
}
