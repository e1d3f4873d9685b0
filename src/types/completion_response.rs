use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::Message;

/// A blocking chat-completion response.
///
/// Only the fields this client reads are modelled; everything else the
/// server sends is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatCompletion {
    /// Server-assigned identifier.
    #[serde(default)]
    pub id: Option<String>,

    /// The model that produced the completion.
    #[serde(default)]
    pub model: Option<String>,

    /// Candidate completions.  `null` and absent both mean "no choices".
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
}

/// One candidate completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Choice {
    /// Position of this choice in the response.
    #[serde(default)]
    pub index: Option<u32>,

    /// The generated message.
    #[serde(default)]
    pub message: Option<ChoiceMessage>,

    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The message carried by a [`Choice`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChoiceMessage {
    /// Role reported by the server.
    #[serde(default)]
    pub role: Option<String>,

    /// Generated text.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Turn the first choice into an assistant message.
    ///
    /// # Errors
    ///
    /// [`Error::NoChoices`] when the choices list is absent or empty, and
    /// [`Error::MalformedResponse`] when the first choice carries no content.
    pub fn into_message(self) -> Result<Message> {
        let choice = self
            .choices
            .and_then(|choices| choices.into_iter().next())
            .ok_or_else(Error::no_choices)?;
        let content = choice
            .message
            .and_then(|message| message.content)
            .ok_or_else(|| Error::malformed_response("first choice has no message content", None))?;
        Ok(Message::assistant(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn first_choice_becomes_assistant_message() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"4"}},{"message":{"content":"5"}}]}"#,
        )
        .unwrap();
        let message = completion.into_message().unwrap();
        assert_eq!(message.role(), Role::Assistant);
        assert_eq!(message.content(), "4");
    }

    #[test]
    fn empty_choices_is_no_choices() {
        let completion: ChatCompletion = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(completion.into_message().unwrap_err().is_no_choices());
    }

    #[test]
    fn absent_or_null_choices_is_no_choices() {
        for body in [r#"{}"#, r#"{"choices":null}"#] {
            let completion: ChatCompletion = serde_json::from_str(body).unwrap();
            assert!(completion.into_message().unwrap_err().is_no_choices());
        }
    }

    #[test]
    fn missing_content_is_malformed() {
        let completion: ChatCompletion =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(completion.into_message().unwrap_err().is_malformed_response());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "model": "gpt-4o",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
            }"#,
        )
        .unwrap();
        assert_eq!(completion.id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(completion.model.as_deref(), Some("gpt-4o"));
        assert_eq!(completion.into_message().unwrap().content(), "hi");
    }
}
