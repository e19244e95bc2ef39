pub mod completions;

pub use completions::{
    CompletionReply, CompletionRequest, CompletionsClient, HttpCompletionsClient,
    DEFAULT_ENDPOINT,
};
