use thiserror::Error;

/// State errors raised by [`crate::Conversation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("a message is already being answered")]
    Busy,
    #[error("no message is waiting for an answer")]
    NotPending,
}
