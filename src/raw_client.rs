//! A completion transport that speaks plain HTTP.
//!
//! The request body is assembled by hand, the response is read as text and
//! navigated as an untyped JSON value.  Every request and response goes
//! through the attached [`ClientLogger`], which makes this transport the one
//! to reach for when the wire traffic itself is in question.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client as ReqwestClient;
use reqwest::header::{self, HeaderValue};
use serde_json::{Value, json};
use url::Url;

use crate::client::{auth_headers, build_http_client, error_for_status, send_request};
use crate::client_logger::{ClientLogger, redact_headers};
use crate::config::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, DialConfig, completions_url};
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::decode_stream;
use crate::transport::{CompletionTransport, FragmentStream};
use crate::types::{CompletionRequest, Message};

/// Hand-rolled HTTP client for a DIAL / Azure-OpenAI style deployment.
#[derive(Clone)]
pub struct RawHttpClient {
    api_key: String,
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl std::fmt::Debug for RawHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawHttpClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

impl RawHttpClient {
    /// Create a client with custom settings.
    pub fn with_options(
        api_key: impl Into<String>,
        endpoint: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::authentication("API key must not be empty"));
        }
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        Ok(Self {
            api_key,
            client: build_http_client(timeout)?,
            endpoint: Url::parse(endpoint.unwrap_or(DEFAULT_ENDPOINT))?,
            timeout,
            logger: None,
        })
    }

    /// Create a client from an assembled configuration.
    pub fn from_config(config: &DialConfig) -> Result<Self> {
        Self::with_options(
            config.api_key()?,
            Some(&config.endpoint),
            Some(config.timeout),
        )
    }

    /// Attach a traffic logger.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    async fn post(&self, request: &CompletionRequest, streaming: bool) -> Result<reqwest::Response> {
        let url = completions_url(&self.endpoint, &request.deployment)?;
        let mut headers = auth_headers(&self.api_key)?;
        let mut body = json!({ "messages": request.messages });
        if streaming {
            headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
            body["stream"] = Value::Bool(true);
        }

        if let Some(logger) = &self.logger {
            logger.log_request(url.as_str(), &redact_headers(&headers), &body);
        }
        tracing::debug!(url = %url, streaming, "sending raw completion request");

        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let builder = self.client.post(url).headers(headers).body(body.to_string());
        let result = send_request(builder, self.timeout, streaming).await;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        let response = result.inspect_err(|_| CLIENT_REQUEST_ERRORS.click())?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(error_for_status(response, self.logger.as_deref()).await);
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl CompletionTransport for RawHttpClient {
    fn name(&self) -> &'static str {
        "raw"
    }

    async fn get_completion(&self, request: &CompletionRequest) -> Result<Message> {
        let response = self.post(request, false).await?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            Error::http_client(format!("Failed to read response: {e}"), Some(Box::new(e)))
        })?;
        if let Some(logger) = &self.logger {
            logger.log_response(status, &text);
        }
        let content = first_choice_content(&text)?;
        Ok(Message::assistant(content))
    }

    async fn stream_completion(&self, request: &CompletionRequest) -> Result<FragmentStream> {
        let response = self.post(request, true).await?;
        if let Some(logger) = &self.logger {
            logger.log_response(response.status().as_u16(), "");
        }
        Ok(Box::pin(decode_stream(
            Box::pin(response.bytes_stream()),
            self.logger.clone(),
        )))
    }
}

/// Pull `choices[0].message.content` out of a raw response body.
fn first_choice_content(text: &str) -> Result<String> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        Error::malformed_response(format!("response is not JSON: {e}"), Some(Box::new(e)))
    })?;
    if !value.is_object() {
        return Err(Error::malformed_response("response is not a JSON object", None));
    }
    let first = match value.get("choices") {
        None | Some(Value::Null) => return Err(Error::no_choices()),
        Some(Value::Array(choices)) => choices.first().ok_or_else(Error::no_choices)?,
        Some(_) => return Err(Error::malformed_response("`choices` is not an array", None)),
    };
    first
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::malformed_response("first choice has no message content", None))
}
