pub mod builder;
pub mod client;
pub mod error;
pub mod models;
pub mod repositories;

pub use builder::PersistClientBuilder;
pub use client::{DedupConfig, PersistClient, ThreadOverview};
pub use error::PersistError;
pub use models::{MessageRole, StoredMessage, Thread, DEFAULT_TITLE, MAX_MESSAGE_CHARS};
pub use repositories::{MessageRepository, ThreadRepository};
