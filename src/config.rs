//! Connection configuration.
//!
//! A [`DialConfig`] is assembled from defaults, an optional YAML file, the
//! environment, and finally command-line flags, and is then handed to the
//! transports explicitly.  Nothing reads ambient global state after startup.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::transport::TransportKind;

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://ai-proxy.lab.epam.com";

/// Deployment used when none is configured.
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";

/// System prompt used when the user enters none.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an assistant who answers concisely and informatively.";

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable holding the credential.
pub const API_KEY_ENV: &str = "DIAL_API_KEY";

/// Environment variable holding the endpoint.
pub const ENDPOINT_ENV: &str = "DIAL_ENDPOINT";

/// Environment variable holding the deployment.
pub const DEPLOYMENT_ENV: &str = "DIAL_DEPLOYMENT";

/// Everything a transport needs to reach a deployment.
#[derive(Clone, PartialEq)]
pub struct DialConfig {
    /// Base URL of the service, without the `/openai/...` suffix.
    pub endpoint: String,
    /// Static credential sent in the `api-key` header.
    pub api_key: Option<String>,
    /// Deployment (model) identifier.
    pub deployment: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Which transport implementation to use.
    pub transport: TransportKind,
    /// Stream replies instead of waiting for the full body.
    pub stream: bool,
    /// Fallback system prompt.
    pub system_prompt: String,
    /// Dump raw traffic to stderr.
    pub verbose: bool,
}

impl std::fmt::Debug for DialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("deployment", &self.deployment)
            .field("timeout", &self.timeout)
            .field("transport", &self.transport)
            .field("stream", &self.stream)
            .field("system_prompt", &self.system_prompt)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl DialConfig {
    /// Creates a new DialConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: `https://ai-proxy.lab.epam.com`
    /// - Deployment: `gpt-4o`
    /// - Timeout: 60 seconds
    /// - Transport: sdk
    /// - Streaming: enabled
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            deployment: DEFAULT_DEPLOYMENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            transport: TransportKind::Sdk,
            stream: true,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            verbose: false,
        }
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the deployment.
    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = deployment.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the transport implementation.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Sets streaming or blocking mode.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Sets the fallback system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Enables or disables raw traffic dumps.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Overlay values from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn merge_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        let file = ConfigFile::from_yaml(&content)?;
        Ok(self.merge(file))
    }

    /// Overlay values present in `file`.
    pub fn merge(mut self, file: ConfigFile) -> Self {
        if let Some(endpoint) = file.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(api_key) = file.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(deployment) = file.deployment {
            self.deployment = deployment;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(transport) = file.transport {
            self.transport = transport;
        }
        if let Some(stream) = file.stream {
            self.stream = stream;
        }
        if let Some(prompt) = file.system_prompt {
            self.system_prompt = prompt;
        }
        if let Some(verbose) = file.verbose {
            self.verbose = verbose;
        }
        self
    }

    /// Overlay values from the process environment.
    pub fn merge_env(self) -> Self {
        self.merge_env_with(|name| std::env::var(name).ok())
    }

    /// Overlay values from an environment lookup.  Empty values are ignored.
    pub fn merge_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(api_key) = lookup(API_KEY_ENV) {
            self.api_key = Some(api_key);
        }
        if let Some(endpoint) = lookup(ENDPOINT_ENV) {
            self.endpoint = endpoint;
        }
        if let Some(deployment) = lookup(DEPLOYMENT_ENV) {
            self.deployment = deployment;
        }
        self
    }

    /// The credential.
    ///
    /// # Errors
    ///
    /// Returns an authentication error when no credential is configured.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })
    }

    /// The parsed endpoint.
    ///
    /// # Errors
    ///
    /// Returns a URL error when the endpoint is not a valid absolute URL.
    pub fn endpoint_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.endpoint)?)
    }
}

impl Default for DialConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The chat-completions URL for `deployment` under `endpoint`.
///
/// Yields `<endpoint>/openai/deployments/<deployment>/chat/completions`,
/// tolerating a trailing slash on the endpoint and percent-encoding the
/// deployment.
///
/// # Errors
///
/// Returns a configuration error for endpoints that cannot carry a path.
pub fn completions_url(endpoint: &Url, deployment: &str) -> Result<Url> {
    if deployment.is_empty() {
        return Err(Error::configuration("deployment must not be empty"));
    }
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|()| Error::configuration(format!("endpoint {endpoint} cannot be a base URL")))?
        .pop_if_empty()
        .extend(["openai", "deployments", deployment, "chat", "completions"]);
    Ok(url)
}

/// The on-disk YAML form of [`DialConfig`].  Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Base URL of the service.
    pub endpoint: Option<String>,
    /// Static credential.
    pub api_key: Option<String>,
    /// Deployment identifier.
    pub deployment: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// `sdk` or `raw`.
    pub transport: Option<TransportKind>,
    /// Stream replies.
    pub stream: Option<bool>,
    /// Fallback system prompt.
    pub system_prompt: Option<String>,
    /// Dump raw traffic.
    pub verbose: Option<bool>,
}

impl ConfigFile {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on invalid YAML or unknown keys.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|err| Error::configuration(format!("invalid config file: {err}")))
    }
}

impl FromStr for ConfigFile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_yaml(s)
    }
}
