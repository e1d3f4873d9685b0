use serde::{Deserialize, Serialize};

use crate::types::Role;

/// One turn in a conversation.
///
/// A message is immutable once constructed.  On the wire it is the two-field
/// mapping `{"role": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    /// Create a new `Message` with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new system `Message`.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user `Message`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant `Message`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// The author of this message.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The text of this message.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume the message, returning its text.
    pub fn into_content(self) -> String {
        self.content
    }
}
