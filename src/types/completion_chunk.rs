use serde::Deserialize;

/// One partial update of a streamed chat completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatCompletionChunk {
    /// Server-assigned identifier, repeated on every chunk.
    #[serde(default)]
    pub id: Option<String>,

    /// Candidate deltas; may be absent, `null`, or empty.
    #[serde(default)]
    pub choices: Option<Vec<ChunkChoice>>,
}

/// One candidate within a [`ChatCompletionChunk`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChunkChoice {
    /// Position of this choice in the response.
    #[serde(default)]
    pub index: Option<u32>,

    /// Incremental update.
    #[serde(default)]
    pub delta: Option<Delta>,

    /// Why generation stopped, on the final chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// An incremental content fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Delta {
    /// Role, sent on the first chunk only.
    #[serde(default)]
    pub role: Option<String>,

    /// Text to append.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// The first choice's delta content, or the empty string.
    pub fn fragment(&self) -> &str {
        self.choices
            .as_deref()
            .and_then(<[ChunkChoice]>::first)
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
            .unwrap_or("")
    }

    /// Take the first choice's delta content, or the empty string.
    pub fn into_fragment(self) -> String {
        self.choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(json: &str) -> ChatCompletionChunk {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn fragment_from_first_choice() {
        let c = chunk(r#"{"choices":[{"delta":{"content":"Hel"}},{"delta":{"content":"x"}}]}"#);
        assert_eq!(c.fragment(), "Hel");
        assert_eq!(c.into_fragment(), "Hel");
    }

    #[test]
    fn missing_pieces_default_to_empty() {
        for json in [
            r#"{}"#,
            r#"{"choices":null}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":[{}]}"#,
            r#"{"choices":[{"delta":{}}]}"#,
            r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"delta":{"content":null}}]}"#,
        ] {
            assert_eq!(chunk(json).fragment(), "", "{json}");
        }
    }
}
