mod message;
mod thread;

pub use message::{MessageRole, StoredMessage, MAX_MESSAGE_CHARS};
pub use thread::{Thread, DEFAULT_TITLE};
