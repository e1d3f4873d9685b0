//! The completion transport seam.
//!
//! A [`CompletionTransport`] turns a [`CompletionRequest`] into either a single
//! assistant [`Message`] or a live [`FragmentStream`].  Two implementations
//! exist, selected by [`TransportKind`] rather than by subclassing:
//!
//! - [`DialClient`]: typed request and response structs
//! - [`RawHttpClient`]: hand-assembled JSON, raw body text, manual navigation

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use futures::Stream;
use serde::Deserialize;

use crate::accumulating_stream::AccumulatingStream;
use crate::client::DialClient;
use crate::client_logger::ClientLogger;
use crate::config::DialConfig;
use crate::error::Result;
use crate::raw_client::RawHttpClient;
use crate::types::{CompletionRequest, Message};

/// A lazy, finite, non-restartable sequence of content fragments.
///
/// Dropping the stream closes the underlying connection.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Sends completion requests to a deployment.
#[async_trait::async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Send the request and wait for the full response.
    ///
    /// # Errors
    ///
    /// [`Error::Http`](crate::Error::Http) on a non-success status,
    /// [`Error::NoChoices`](crate::Error::NoChoices) when the response has no
    /// choices, [`Error::MalformedResponse`](crate::Error::MalformedResponse)
    /// when the body has an unexpected shape, or a transport error.
    async fn get_completion(&self, request: &CompletionRequest) -> Result<Message>;

    /// Send the request with streaming enabled and return the fragments as
    /// they arrive.  The request's own streaming flag is ignored.
    ///
    /// # Errors
    ///
    /// [`Error::Http`](crate::Error::Http) when the server refuses the stream,
    /// or a transport error.  Failures after the stream starts are yielded as
    /// [`Error::Streaming`](crate::Error::Streaming) items.
    async fn stream_completion(&self, request: &CompletionRequest) -> Result<FragmentStream>;
}

/// Send `request` in the mode its streaming flag selects and return the
/// assistant message.
///
/// # Errors
///
/// Any error of the selected mode.  A stream that fails part-way produces no
/// message.
pub async fn complete(
    transport: &dyn CompletionTransport,
    request: &CompletionRequest,
) -> Result<Message> {
    if request.stream {
        let stream = transport.stream_completion(request).await?;
        AccumulatingStream::drain(stream).await
    } else {
        transport.get_completion(request).await
    }
}

/// Which transport implementation to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Typed client, [`DialClient`].
    #[default]
    Sdk,
    /// Hand-rolled HTTP client, [`RawHttpClient`].
    Raw,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Sdk => write!(f, "sdk"),
            TransportKind::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    /// Parse a transport kind.
    ///
    /// Accepts "sdk", "raw", or "http" (case-insensitive).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sdk" => Ok(TransportKind::Sdk),
            "raw" | "http" => Ok(TransportKind::Raw),
            _ => Err(format!(
                "Invalid transport: {s}. Valid options: sdk, raw"
            )),
        }
    }
}

/// Build the transport `config` selects.
///
/// # Errors
///
/// Fails when the configuration has no credential or an invalid endpoint.
pub fn build_transport(
    config: &DialConfig,
    logger: Option<Arc<dyn ClientLogger>>,
) -> Result<Box<dyn CompletionTransport>> {
    let transport: Box<dyn CompletionTransport> = match config.transport {
        TransportKind::Sdk => {
            let client = DialClient::from_config(config)?;
            Box::new(match logger {
                Some(logger) => client.with_logger(logger),
                None => client,
            })
        }
        TransportKind::Raw => {
            let client = RawHttpClient::from_config(config)?;
            Box::new(match logger {
                Some(logger) => client.with_logger(logger),
                None => client,
            })
        }
    };
    tracing::debug!(transport = transport.name(), "built transport");
    Ok(transport)
}
