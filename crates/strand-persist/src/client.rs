use chrono::Duration;
use mongodb::bson::oid::ObjectId;
use mongodb::Client;
use tracing::warn;

use crate::error::{PersistError, Result};
use crate::models::{MessageRole, StoredMessage, Thread, MAX_MESSAGE_CHARS};
use crate::repositories::{MessageRepository, ThreadRepository};

/// Duplicate-detection windows, in milliseconds.
///
/// The manual-create path uses a wider window than the upsert path; both are
/// configurable because the window is a tuning knob, not a behavioral promise.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    pub manual_window_ms: i64,
    pub upsert_window_ms: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            manual_window_ms: 2000,
            upsert_window_ms: 1000,
        }
    }
}

/// Thread plus the sidebar preview data the thread list needs.
#[derive(Debug, Clone)]
pub struct ThreadOverview {
    pub thread: Thread,
    pub message_count: u64,
    pub last_message: Option<StoredMessage>,
}

/// Store adapter over threads and messages.
///
/// Ownership is enforced here: every operation that takes a `user_id` verifies
/// the thread belongs to that user before touching messages. Thread ids coming
/// from clients are never trusted on their own.
pub struct PersistClient {
    thread_repo: ThreadRepository,
    message_repo: MessageRepository,
    dedup: DedupConfig,
}

impl PersistClient {
    pub async fn connect(mongodb_uri: &str, db_name: &str, dedup: DedupConfig) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self {
            thread_repo: ThreadRepository::new(&client, db_name),
            message_repo: MessageRepository::new(&client, db_name),
            dedup,
        })
    }

    pub fn dedup(&self) -> DedupConfig {
        self.dedup
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    pub async fn create_thread(
        &self,
        user_id: String,
        model: String,
        title: String,
    ) -> Result<Thread> {
        self.thread_repo.create_thread(user_id, model, title).await
    }

    /// Fetch a thread and verify ownership.
    ///
    /// Distinguishes missing from foreign-owned internally; API layers must
    /// collapse both into the same not-found response.
    pub async fn get_owned_thread(&self, thread_id: ObjectId, user_id: &str) -> Result<Thread> {
        let thread = self
            .thread_repo
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_hex()))?;

        if thread.user_id != user_id {
            return Err(PersistError::Ownership(thread_id.to_hex()));
        }

        Ok(thread)
    }

    pub async fn list_threads(
        &self,
        user_id: &str,
        limit: i64,
        offset: u64,
    ) -> Result<(Vec<ThreadOverview>, u64)> {
        let threads = self.thread_repo.list_threads(user_id, limit, offset).await?;
        let total = self.thread_repo.count_threads(user_id).await?;

        let mut overviews = Vec::with_capacity(threads.len());
        for thread in threads {
            let message_count = self.message_repo.count_messages(thread.id).await?;
            let last_message = self.message_repo.last_message(thread.id).await?;
            overviews.push(ThreadOverview {
                thread,
                message_count,
                last_message,
            });
        }

        Ok((overviews, total))
    }

    pub async fn delete_thread(&self, thread_id: ObjectId, user_id: &str) -> Result<()> {
        // Ownership check doubles as the existence check.
        self.get_owned_thread(thread_id, user_id).await?;

        self.message_repo.delete_thread_messages(thread_id).await?;
        self.thread_repo.delete_thread(thread_id, user_id).await?;
        Ok(())
    }

    pub async fn rename_thread(
        &self,
        thread_id: ObjectId,
        user_id: &str,
        title: &str,
    ) -> Result<()> {
        self.get_owned_thread(thread_id, user_id).await?;

        self.thread_repo
            .rename_thread(thread_id, user_id, title)
            .await?;
        Ok(())
    }

    /// Apply a generated title. No-op when the thread has already been renamed.
    pub async fn set_generated_title(&self, thread_id: ObjectId, title: &str) -> Result<bool> {
        self.thread_repo.set_generated_title(thread_id, title).await
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Create a message with ownership + content validation and window-based
    /// duplicate suppression. Returns the existing row when a recent duplicate
    /// is found.
    pub async fn create_message(
        &self,
        thread_id: ObjectId,
        user_id: &str,
        role: MessageRole,
        content: String,
        model: String,
        reasoning: Option<String>,
    ) -> Result<StoredMessage> {
        validate_content(role, &content)?;
        self.get_owned_thread(thread_id, user_id).await?;

        let window = Duration::milliseconds(self.dedup.manual_window_ms);
        if let Some(existing) = self
            .message_repo
            .find_recent_duplicate(thread_id, role, &content, window)
            .await?
        {
            warn!(
                thread_id = %thread_id.to_hex(),
                message_id = %existing.id.to_hex(),
                "Duplicate message detected, returning existing"
            );
            return Ok(existing);
        }

        let message = StoredMessage {
            id: ObjectId::new(),
            thread_id,
            role,
            content,
            model,
            reasoning,
            created_at: chrono::Utc::now(),
        };

        let message = self.message_repo.save_message(message).await?;
        self.thread_repo.touch_thread(thread_id).await?;
        Ok(message)
    }

    /// Idempotent write used on the chat hot path; see
    /// [`MessageRepository::upsert_message`].
    pub async fn upsert_message(
        &self,
        thread_id: ObjectId,
        user_id: &str,
        role: MessageRole,
        content: &str,
        model: &str,
        reasoning: Option<&str>,
    ) -> Result<StoredMessage> {
        validate_content(role, content)?;
        self.get_owned_thread(thread_id, user_id).await?;

        let window = Duration::milliseconds(self.dedup.upsert_window_ms);
        let message = self
            .message_repo
            .upsert_message(thread_id, role, content, model, reasoning, window)
            .await?;
        self.thread_repo.touch_thread(thread_id).await?;
        Ok(message)
    }

    pub async fn find_recent_duplicate(
        &self,
        thread_id: ObjectId,
        role: MessageRole,
        content: &str,
    ) -> Result<Option<StoredMessage>> {
        let window = Duration::milliseconds(self.dedup.manual_window_ms);
        self.message_repo
            .find_recent_duplicate(thread_id, role, content, window)
            .await
    }

    /// Paginated, owner-scoped message listing.
    pub async fn list_thread_messages(
        &self,
        thread_id: ObjectId,
        user_id: &str,
        limit: i64,
        offset: u64,
    ) -> Result<(Vec<StoredMessage>, u64)> {
        self.get_owned_thread(thread_id, user_id).await?;

        let messages = self
            .message_repo
            .get_messages_paginated(thread_id, limit, offset)
            .await?;
        let total = self.message_repo.count_messages(thread_id).await?;
        Ok((messages, total))
    }

    pub async fn get_messages(&self, thread_id: ObjectId) -> Result<Vec<StoredMessage>> {
        self.message_repo.get_messages(thread_id).await
    }

    pub async fn count_messages(&self, thread_id: ObjectId) -> Result<u64> {
        self.message_repo.count_messages(thread_id).await
    }
}

/// Size and emptiness rules shared by every message write path.
fn validate_content(role: MessageRole, content: &str) -> Result<()> {
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(PersistError::Validation(format!(
            "content exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    if role == MessageRole::User && content.trim().is_empty() {
        return Err(PersistError::Validation(
            "user message content must not be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_at_bound_is_accepted() {
        let content = "x".repeat(MAX_MESSAGE_CHARS);
        assert!(validate_content(MessageRole::User, &content).is_ok());
    }

    #[test]
    fn test_content_over_bound_is_rejected() {
        let content = "x".repeat(MAX_MESSAGE_CHARS + 1);
        let err = validate_content(MessageRole::Assistant, &content).unwrap_err();
        assert!(matches!(err, PersistError::Validation(_)));
    }

    #[test]
    fn test_blank_user_content_is_rejected() {
        let err = validate_content(MessageRole::User, "   ").unwrap_err();
        assert!(matches!(err, PersistError::Validation(_)));
    }

    #[test]
    fn test_blank_assistant_content_is_allowed() {
        // The abort path may persist short assistant output; emptiness rules
        // only bind user messages.
        assert!(validate_content(MessageRole::Assistant, "").is_ok());
    }

    #[test]
    fn test_default_dedup_windows() {
        let dedup = DedupConfig::default();
        assert_eq!(dedup.manual_window_ms, 2000);
        assert_eq!(dedup.upsert_window_ms, 1000);
    }
}
