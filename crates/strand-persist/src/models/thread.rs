use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Fallback title for threads whose prompt yields nothing usable.
pub const DEFAULT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: String,
    pub model: String,
    pub title: String,
    /// True until the model-assisted title pass (or a user rename) lands.
    /// Guards against overwriting a title the user chose themselves.
    pub title_provisional: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_serializes_dates_as_bson_datetime() {
        let thread = Thread {
            id: ObjectId::new(),
            user_id: "user_123".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            title: DEFAULT_TITLE.to_string(),
            title_provisional: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let doc = bson::to_document(&thread).unwrap();
        assert!(matches!(
            doc.get("created_at"),
            Some(bson::Bson::DateTime(_))
        ));
        assert_eq!(doc.get_str("title").unwrap(), "New Chat");
        assert!(doc.get_bool("title_provisional").unwrap());
    }
}
