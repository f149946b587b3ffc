pub mod capabilities;
pub mod openrouter;
pub mod streaming;
pub mod traits;
pub mod types;

pub use capabilities::supports_reasoning;
pub use openrouter::OpenRouterClient;
pub use streaming::StreamEvent;
pub use traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, TokenUsage};
pub use types::Message;
