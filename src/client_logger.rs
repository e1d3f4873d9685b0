//! Logging seam for raw request/response traffic.
//!
//! Transports report every request they send, every response body they read,
//! and every raw stream line to an attached [`ClientLogger`].  Nothing is
//! attached by default; the chat binary attaches a [`StderrLogger`] when run
//! with `--verbose`.

use reqwest::header::HeaderMap;

use crate::Message;

/// Header that carries the credential.
pub const API_KEY_HEADER: &str = "api-key";

/// Replacement shown instead of a credential.
pub const REDACTED: &str = "<redacted>";

/// A trait for logging raw client traffic.
///
/// # Example
///
/// ```rust,ignore
/// use dialchat::{ClientLogger, Message};
/// use std::sync::Mutex;
///
/// #[derive(Default)]
/// struct Recorder {
///     lines: Mutex<Vec<String>>,
/// }
///
/// impl ClientLogger for Recorder {
///     fn log_request(&self, url: &str, _: &[(String, String)], _: &serde_json::Value) {
///         self.lines.lock().unwrap().push(url.to_string());
///     }
///
///     fn log_response(&self, status: u16, _: &str) {
///         self.lines.lock().unwrap().push(status.to_string());
///     }
///
///     fn log_stream_line(&self, line: &str) {
///         self.lines.lock().unwrap().push(line.to_string());
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log an outgoing request.  Headers arrive already redacted.
    fn log_request(&self, url: &str, headers: &[(String, String)], body: &serde_json::Value);

    /// Log the status and raw body of a response.  A successful stream is
    /// logged with an empty body; its lines follow through `log_stream_line`.
    fn log_response(&self, status: u16, body: &str);

    /// Log one raw line of a streamed response, without its newline.
    fn log_stream_line(&self, line: &str);

    /// Log the message reassembled from a completed stream.
    fn log_stream_message(&self, message: &Message) {
        _ = message;
    }
}

/// Render headers as name/value pairs with the credential replaced.
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name.as_str().eq_ignore_ascii_case(API_KEY_HEADER)
                || *name == reqwest::header::AUTHORIZATION
            {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}

/// Prints traffic to stderr in a human-readable form.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl ClientLogger for StderrLogger {
    fn log_request(&self, url: &str, headers: &[(String, String)], body: &serde_json::Value) {
        eprintln!("\n=== REQUEST ===");
        eprintln!("URL: {url}");
        eprintln!("Headers:");
        for (name, value) in headers {
            eprintln!("  {name}: {value}");
        }
        match serde_json::to_string_pretty(body) {
            Ok(json) => eprintln!("Body: {json}"),
            Err(e) => eprintln!("Body: <serialization error: {e}>"),
        }
    }

    fn log_response(&self, status: u16, body: &str) {
        eprintln!("\n=== RESPONSE ===");
        eprintln!("Status Code: {status}");
        if body.is_empty() {
            return;
        }
        match serde_json::from_str::<serde_json::Value>(body)
            .and_then(|value| serde_json::to_string_pretty(&value))
        {
            Ok(json) => eprintln!("Response: {json}"),
            Err(_) => eprintln!("Response: {body}"),
        }
    }

    fn log_stream_line(&self, line: &str) {
        if !line.trim().is_empty() {
            eprintln!("--- CHUNK --- {line}");
        }
    }

    fn log_stream_message(&self, message: &Message) {
        eprintln!("\n=== ASSISTANT RESPONSE ===\n{}", message.content());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderValue};

    #[test]
    fn api_key_is_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("sk-secret"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let redacted = redact_headers(&headers);
        assert!(redacted.contains(&(API_KEY_HEADER.to_string(), REDACTED.to_string())));
        assert!(redacted.contains(&("content-type".to_string(), "application/json".to_string())));
        assert!(!redacted.iter().any(|(_, value)| value.contains("sk-secret")));
    }
}
