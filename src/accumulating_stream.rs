//! Accumulates streamed fragments into a complete message while passing them through.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::types::Message;

/// A stream wrapper that accumulates content fragments into an assistant `Message`.
///
/// This allows printing tokens as they arrive while simultaneously building the final message
/// without a second pass.  When the stream is fully drained, the accumulated message is sent
/// via the oneshot channel returned by `new()`.  If any fragment failed, the channel carries
/// that failure instead, so a partial reply is never mistaken for a complete one.
pub struct AccumulatingStream {
    inner: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
    message_tx: Option<tokio::sync::oneshot::Sender<Result<Message>>>,
    content: String,
    failure: Option<Error>,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl AccumulatingStream {
    /// Wraps a fragment stream to accumulate it into a `Message`.
    ///
    /// Returns the stream and a receiver that will contain the accumulated `Message` once the
    /// stream is fully drained.
    pub fn new<S>(stream: S) -> (Self, tokio::sync::oneshot::Receiver<Result<Message>>)
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let this = Self {
            inner: Box::pin(stream),
            message_tx: Some(tx),
            content: String::new(),
            failure: None,
            logger: None,
        };
        (this, rx)
    }

    /// Report the finished message to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Drain `stream` and return the assembled message.
    ///
    /// # Errors
    ///
    /// Returns the first error the stream yields.
    pub async fn drain<S>(stream: S) -> Result<Message>
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        let (mut acc, rx) = Self::new(stream);
        while let Some(item) = acc.next().await {
            item?;
        }
        rx.await
            .map_err(|_| Error::streaming("accumulator dropped before completion", None))?
    }

    /// The text accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    fn finalize(&mut self) -> Result<Message> {
        if let Some(err) = self.failure.take() {
            return Err(err);
        }
        let message = Message::assistant(std::mem::take(&mut self.content));
        if let Some(logger) = &self.logger {
            logger.log_stream_message(&message);
        }
        Ok(message)
    }
}

impl Stream for AccumulatingStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                self.content.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(e))) => {
                if self.failure.is_none() {
                    self.failure = Some(e.clone());
                }
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if let Some(tx) = self.message_tx.take() {
                    let result = self.finalize();
                    let _ = tx.send(result);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
