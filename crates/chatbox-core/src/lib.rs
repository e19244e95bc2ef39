pub mod ai;
pub mod config;
pub mod conversation;
pub mod error;
pub mod state;
pub mod storage;

// Re-export main types for convenience
pub use ai::{CompletionReply, CompletionRequest, CompletionsClient, HttpCompletionsClient};
pub use config::GlobalConfig;
pub use conversation::Conversation;
pub use error::ConversationError;
pub use state::{ChatMessage, ChatRole};
pub use storage::{FileStorage, MemoryStorage, Storage};
