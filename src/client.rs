use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use url::Url;

use crate::client_logger::{API_KEY_HEADER, ClientLogger, redact_headers};
use crate::config::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, DialConfig, completions_url};
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::decode_stream;
use crate::transport::{CompletionTransport, FragmentStream};
use crate::types::{ChatCompletion, CompletionRequest, Message};

/// Typed client for a DIAL / Azure-OpenAI style deployment.
///
/// Requests are serialized from [`CompletionRequest`] and responses are
/// deserialized into [`ChatCompletion`] before the first choice is extracted.
#[derive(Clone)]
pub struct DialClient {
    api_key: String,
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl std::fmt::Debug for DialClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

impl DialClient {
    /// Create a client for the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: impl Into<String>,
        endpoint: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::authentication("API key must not be empty"));
        }
        let endpoint = Url::parse(endpoint.unwrap_or(DEFAULT_ENDPOINT))?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        Ok(Self {
            api_key,
            client: build_http_client(timeout)?,
            endpoint,
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

    async fn post(&self, request: &CompletionRequest, streaming: bool) -> Result<Response> {
        let url = completions_url(&self.endpoint, &request.deployment)?;
        let mut headers = auth_headers(&self.api_key)?;
        let body = if streaming {
            headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
            request.streaming_body()
        } else {
            request.body()
        };

        if let Some(logger) = &self.logger {
            logger.log_request(url.as_str(), &redact_headers(&headers), &serde_json::to_value(body)?);
        }
        tracing::debug!(
            url = %url,
            messages = request.messages.len(),
            streaming,
            "sending completion request"
        );

        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let builder = self.client.post(url).headers(headers).json(&body);
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
impl CompletionTransport for DialClient {
    fn name(&self) -> &'static str {
        "sdk"
    }

    async fn get_completion(&self, request: &CompletionRequest) -> Result<Message> {
        let response = self.post(request, false).await?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            Error::http_client(
                format!("Failed to read response: {}", e),
                Some(Box::new(e)),
            )
        })?;
        if let Some(logger) = &self.logger {
            logger.log_response(status, &text);
        }

        let completion: ChatCompletion = serde_json::from_str(&text).map_err(|e| {
            Error::malformed_response(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })?;
        let message = completion.into_message()?;
        tracing::debug!(chars = message.content().len(), "received completion");
        Ok(message)
    }

    async fn stream_completion(&self, request: &CompletionRequest) -> Result<FragmentStream> {
        let response = self.post(request, true).await?;
        let status = response.status().as_u16();
        if let Some(logger) = &self.logger {
            logger.log_response(status, "");
        }
        tracing::debug!(status, "stream opened");
        Ok(Box::pin(decode_stream(
            Box::pin(response.bytes_stream()),
            self.logger.clone(),
        )))
    }
}

/// Build the underlying HTTP client.
///
/// Only connecting is bounded here.  [`send_request`] applies the rest of the
/// deadline per request, since a stream may run for as long as the server
/// keeps sending.
pub(crate) fn build_http_client(timeout: Duration) -> Result<ReqwestClient> {
    ReqwestClient::builder()
        .connect_timeout(timeout)
        .build()
        .map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {}", e),
                Some(Box::new(e)),
            )
        })
}

/// Send `builder` and wait for the response headers.
///
/// A blocking request is bounded by `timeout` from connect through the end of
/// the body.  A streaming request is bounded only until its headers arrive.
pub(crate) async fn send_request(
    builder: RequestBuilder,
    timeout: Duration,
    streaming: bool,
) -> Result<Response> {
    if !streaming {
        return builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::from_send(e, timeout));
    }
    match tokio::time::timeout(timeout, builder.send()).await {
        Ok(result) => result.map_err(|e| Error::from_send(e, timeout)),
        Err(_) => Err(Error::timeout(
            format!("No response within {}s", timeout.as_secs_f64()),
            Some(timeout.as_secs_f64()),
        )),
    }
}

/// The headers every completion request carries.
pub(crate) fn auth_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    let mut key = HeaderValue::from_str(api_key)
        .map_err(|_| Error::configuration("API key is not a valid header value"))?;
    key.set_sensitive(true);
    headers.insert(API_KEY_HEADER, key);
    Ok(headers)
}

/// Turn a non-success response into [`Error::Http`], keeping the raw body.
pub(crate) async fn error_for_status(
    response: Response,
    logger: Option<&dyn ClientLogger>,
) -> Error {
    let status = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return Error::http_client(
                format!("Failed to read error response: {}", e),
                Some(Box::new(e)),
            );
        }
    };
    if let Some(logger) = logger {
        logger.log_response(status, &body);
    }
    tracing::warn!(status, "completion request failed");
    Error::http(status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = DialClient::new("test-key").unwrap();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.endpoint.as_str(), "https://ai-proxy.lab.epam.com/");
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client = DialClient::with_options(
            "test-key",
            Some("http://localhost:8080/proxy"),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.endpoint.as_str(), "http://localhost:8080/proxy");
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn client_rejects_bad_settings() {
        assert!(DialClient::new("").unwrap_err().is_authentication());
        assert!(matches!(
            DialClient::with_options("key", Some("not a url"), None).unwrap_err(),
            Error::Url { .. }
        ));
        assert!(DialClient::from_config(&DialConfig::new()).unwrap_err().is_authentication());
    }

    #[test]
    fn debug_hides_api_key() {
        let client = DialClient::new("sk-secret").unwrap();
        assert!(!format!("{client:?}").contains("sk-secret"));
    }

    #[test]
    fn headers_carry_api_key() {
        let headers = auth_headers("sk-secret").unwrap();
        assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "sk-secret");
        assert!(headers.get(API_KEY_HEADER).unwrap().is_sensitive());
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert!(auth_headers("bad\nkey").unwrap_err().is_configuration());
    }
}
