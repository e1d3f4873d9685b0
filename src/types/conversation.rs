use crate::types::Message;

/// The ordered transcript of a chat session.
///
/// Messages can only be appended.  The first message is conventionally a
/// system message, but this is not enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation that starts with a system message.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.push(Message::system(prompt));
        conversation
    }

    /// Append a message to the end of the transcript.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The messages in the order they were added.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recently added message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages in the transcript.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if no message has been added.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterate over the messages in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
