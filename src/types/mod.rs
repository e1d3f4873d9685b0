// Public modules
pub mod completion_chunk;
pub mod completion_request;
pub mod completion_response;
pub mod conversation;
pub mod message;
pub mod role;

// Re-exports
pub use completion_chunk::{ChatCompletionChunk, ChunkChoice, Delta};
pub use completion_request::{CompletionRequest, RequestBody};
pub use completion_response::{ChatCompletion, Choice, ChoiceMessage};
pub use conversation::Conversation;
pub use message::Message;
pub use role::Role;
