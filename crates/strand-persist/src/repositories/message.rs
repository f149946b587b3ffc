use chrono::{Duration, Utc};
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::options::ReturnDocument;
use mongodb::{bson::doc, Client, Collection};

use crate::error::{PersistError, Result};
use crate::models::{MessageRole, StoredMessage};

#[derive(Clone)]
pub struct MessageRepository {
    collection: Collection<StoredMessage>,
}

impl MessageRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("messages");
        Self { collection }
    }

    /// Save a single message
    pub async fn save_message(&self, message: StoredMessage) -> Result<StoredMessage> {
        self.collection.insert_one(&message).await?;
        Ok(message)
    }

    /// Most recent message with identical `(thread_id, role, content)` created
    /// within `window` of now. This is the duplicate-write defense for retried
    /// network requests.
    pub async fn find_recent_duplicate(
        &self,
        thread_id: ObjectId,
        role: MessageRole,
        content: &str,
        window: Duration,
    ) -> Result<Option<StoredMessage>> {
        let cutoff = Utc::now() - window;
        let filter = doc! {
            "thread_id": thread_id,
            "role": role.as_str(),
            "content": content,
            "created_at": { "$gte": bson::DateTime::from_millis(cutoff.timestamp_millis()) }
        };

        Ok(self
            .collection
            .find_one(filter)
            .sort(doc! { "created_at": -1 })
            .await?)
    }

    /// Idempotent write: one atomic find-and-modify. A duplicate inside the
    /// window gets its `model` and `reasoning` refreshed; otherwise a new row
    /// is inserted. Concurrent upserts for the same `(thread_id, role,
    /// content)` resolve to a single row as long as they land inside the
    /// window.
    pub async fn upsert_message(
        &self,
        thread_id: ObjectId,
        role: MessageRole,
        content: &str,
        model: &str,
        reasoning: Option<&str>,
        window: Duration,
    ) -> Result<StoredMessage> {
        let cutoff = Utc::now() - window;
        let filter = doc! {
            "thread_id": thread_id,
            "role": role.as_str(),
            "content": content,
            "created_at": { "$gte": bson::DateTime::from_millis(cutoff.timestamp_millis()) }
        };
        let update = upsert_update_doc(model, reasoning);

        self.collection
            .find_one_and_update(filter, update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PersistError::Internal("upsert returned no document".to_string()))
    }

    /// Get all messages for a thread in chronological order
    pub async fn get_messages(&self, thread_id: ObjectId) -> Result<Vec<StoredMessage>> {
        let filter = doc! { "thread_id": thread_id };
        let messages = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    /// Get messages with offset pagination, chronological order
    pub async fn get_messages_paginated(
        &self,
        thread_id: ObjectId,
        limit: i64,
        offset: u64,
    ) -> Result<Vec<StoredMessage>> {
        let filter = doc! { "thread_id": thread_id };
        let messages = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": 1, "_id": 1 })
            .skip(offset)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    /// Count messages in a thread
    pub async fn count_messages(&self, thread_id: ObjectId) -> Result<u64> {
        let filter = doc! { "thread_id": thread_id };
        Ok(self.collection.count_documents(filter).await?)
    }

    /// Most recent message in a thread, if any
    pub async fn last_message(&self, thread_id: ObjectId) -> Result<Option<StoredMessage>> {
        let filter = doc! { "thread_id": thread_id };
        Ok(self
            .collection
            .find_one(filter)
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await?)
    }

    /// Remove every message in a thread (cascade for thread deletion)
    pub async fn delete_thread_messages(&self, thread_id: ObjectId) -> Result<u64> {
        let filter = doc! { "thread_id": thread_id };
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }
}

fn upsert_update_doc(model: &str, reasoning: Option<&str>) -> bson::Document {
    let reasoning_bson = match reasoning {
        Some(r) => bson::Bson::String(r.to_string()),
        None => bson::Bson::Null,
    };
    doc! {
        "$set": { "model": model, "reasoning": reasoning_bson },
        "$setOnInsert": { "created_at": bson::DateTime::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_update_stores_reasoning() {
        let update = upsert_update_doc("openai/o1-mini", Some("chain of thought"));
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("reasoning").unwrap(), "chain of thought");
        assert_eq!(set.get_str("model").unwrap(), "openai/o1-mini");
    }

    #[test]
    fn test_upsert_update_without_reasoning_is_null() {
        let update = upsert_update_doc("openai/gpt-4o-mini", None);
        let set = update.get_document("$set").unwrap();
        assert!(matches!(set.get("reasoning"), Some(bson::Bson::Null)));
        // Only created_at may be insert-only; the filter seeds the identity
        // fields on insert.
        let on_insert = update.get_document("$setOnInsert").unwrap();
        assert_eq!(on_insert.len(), 1);
        assert!(on_insert.get("created_at").is_some());
    }
}
