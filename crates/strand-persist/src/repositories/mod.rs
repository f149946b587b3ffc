mod message;
mod thread;

pub use message::MessageRepository;
pub use thread::ThreadRepository;
