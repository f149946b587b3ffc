use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::{bson::doc, Client, Collection};

use crate::error::Result;
use crate::models::Thread;

#[derive(Clone)]
pub struct ThreadRepository {
    collection: Collection<Thread>,
}

impl ThreadRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("threads");
        Self { collection }
    }

    /// Create a new thread with a provisional title
    pub async fn create_thread(
        &self,
        user_id: String,
        model: String,
        title: String,
    ) -> Result<Thread> {
        let now = Utc::now();
        let thread = Thread {
            id: ObjectId::new(),
            user_id,
            model,
            title,
            title_provisional: true,
            created_at: now,
            updated_at: now,
        };

        self.collection.insert_one(&thread).await?;
        Ok(thread)
    }

    /// Get thread by ID
    pub async fn get_thread(&self, thread_id: ObjectId) -> Result<Option<Thread>> {
        let filter = doc! { "_id": thread_id };
        Ok(self.collection.find_one(filter).await?)
    }

    /// List threads for a user, most recently active first
    pub async fn list_threads(
        &self,
        user_id: &str,
        limit: i64,
        skip: u64,
    ) -> Result<Vec<Thread>> {
        let filter = doc! { "user_id": user_id };
        let threads = self
            .collection
            .find(filter)
            .sort(doc! { "updated_at": -1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }

    pub async fn count_threads(&self, user_id: &str) -> Result<u64> {
        let filter = doc! { "user_id": user_id };
        Ok(self.collection.count_documents(filter).await?)
    }

    /// Set the generated title, but only while the title is still provisional.
    ///
    /// Returns false when the guard did not match (user already renamed the
    /// thread, or a concurrent title pass won).
    pub async fn set_generated_title(&self, thread_id: ObjectId, title: &str) -> Result<bool> {
        let filter = doc! { "_id": thread_id, "title_provisional": true };
        let update = doc! {
            "$set": {
                "title": title,
                "title_provisional": false,
                "updated_at": bson::DateTime::now()
            }
        };

        let result = self.collection.update_one(filter, update).await?;
        Ok(result.modified_count > 0)
    }

    /// User-initiated rename. Clears the provisional flag so no later title
    /// generation can overwrite it.
    pub async fn rename_thread(
        &self,
        thread_id: ObjectId,
        user_id: &str,
        title: &str,
    ) -> Result<bool> {
        let filter = doc! { "_id": thread_id, "user_id": user_id };
        let update = doc! {
            "$set": {
                "title": title,
                "title_provisional": false,
                "updated_at": bson::DateTime::now()
            }
        };

        let result = self.collection.update_one(filter, update).await?;
        Ok(result.matched_count > 0)
    }

    /// Touch thread (update updated_at)
    pub async fn touch_thread(&self, thread_id: ObjectId) -> Result<()> {
        let filter = doc! { "_id": thread_id };
        let update = doc! { "$set": { "updated_at": bson::DateTime::now() } };
        self.collection.update_one(filter, update).await?;
        Ok(())
    }

    /// Delete thread (owner-scoped)
    pub async fn delete_thread(&self, thread_id: ObjectId, user_id: &str) -> Result<bool> {
        let filter = doc! { "_id": thread_id, "user_id": user_id };
        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }
}
