use std::fmt;

use serde::{Deserialize, Serialize};

/// The author of a message in a conversation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System role; sets context for the assistant.
    System,

    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl Role {
    /// The wire name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
