use serde::Serialize;

use crate::types::{Conversation, Message};

/// A request for a chat completion.
///
/// Built from the conversation at call time and never stored.  The
/// deployment selects the URL; only the messages and the streaming flag are
/// sent in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Deployment that should serve the request.
    pub deployment: String,

    /// The transcript, in order.
    pub messages: Vec<Message>,

    /// Ask the server for a stream of partial updates.
    pub stream: bool,
}

/// The JSON body of a [`CompletionRequest`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequestBody<'a> {
    /// The transcript, in order.
    pub messages: &'a [Message],

    /// Present (and `true`) only for streaming requests.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl CompletionRequest {
    /// Create a blocking request.
    pub fn new(deployment: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            deployment: deployment.into(),
            messages,
            stream: false,
        }
    }

    /// Create a request from a conversation and one more message that has not
    /// been committed to it yet.
    pub fn for_turn(
        deployment: impl Into<String>,
        conversation: &Conversation,
        pending: &Message,
    ) -> Self {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.extend(conversation.iter().cloned());
        messages.push(pending.clone());
        Self::new(deployment, messages)
    }

    /// Set the streaming flag.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// The body as requested by the streaming flag.
    pub fn body(&self) -> RequestBody<'_> {
        RequestBody {
            messages: &self.messages,
            stream: self.stream,
        }
    }

    /// The body with streaming forced on.
    pub fn streaming_body(&self) -> RequestBody<'_> {
        RequestBody {
            messages: &self.messages,
            stream: true,
        }
    }
}
