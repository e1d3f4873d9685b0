//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolution of
//! those arguments, a config file, and the environment into a [`ChatConfig`].

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::config::DialConfig;
use crate::error::{Error, Result};
use crate::transport::TransportKind;

/// Command-line arguments for the dialchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// YAML file with connection settings.
    #[arrrg(optional, "Read settings from a YAML file", "PATH")]
    pub config: Option<String>,

    /// Base URL of the service.
    #[arrrg(optional, "Service endpoint (default: $DIAL_ENDPOINT)", "URL")]
    pub endpoint: Option<String>,

    /// Deployment to talk to.
    #[arrrg(optional, "Deployment name (default: gpt-4o)", "NAME")]
    pub deployment: Option<String>,

    /// Default system prompt.
    #[arrrg(optional, "System prompt used when none is entered", "PROMPT")]
    pub system: Option<String>,

    /// Transport implementation.
    #[arrrg(optional, "Transport: sdk or raw (default: sdk)", "KIND")]
    pub transport: Option<String>,

    /// Per-request timeout.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Wait for whole replies instead of streaming.
    #[arrrg(flag, "Disable streaming")]
    pub blocking: bool,

    /// Dump raw traffic to stderr.
    #[arrrg(flag, "Print raw requests and responses to stderr")]
    pub verbose: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// Holds the resolved connection settings plus terminal preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Connection and request settings.
    pub dial: DialConfig,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            dial: DialConfig::new(),
            use_color: true,
        }
    }

    /// Replaces the connection settings.
    pub fn with_dial(mut self, dial: DialConfig) -> Self {
        self.dial = dial;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Resolve `args` against the process environment.
    ///
    /// # Errors
    ///
    /// Fails when the config file cannot be read or a flag has an invalid value.
    pub fn resolve(args: ChatArgs) -> Result<Self> {
        Self::resolve_with(args, |name| std::env::var(name).ok())
    }

    /// Resolve `args` with an explicit environment lookup.
    ///
    /// Precedence, lowest first: defaults, the config file, the environment,
    /// then flags.
    pub fn resolve_with<F>(args: ChatArgs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut dial = DialConfig::new();
        if let Some(path) = &args.config {
            dial = dial.merge_file(path)?;
        }
        dial = dial.merge_env_with(lookup);

        if let Some(endpoint) = args.endpoint {
            dial.endpoint = endpoint;
        }
        if let Some(deployment) = args.deployment {
            dial.deployment = deployment;
        }
        if let Some(system) = args.system {
            dial.system_prompt = system;
        }
        if let Some(transport) = args.transport {
            dial.transport = transport
                .parse::<TransportKind>()
                .map_err(Error::configuration)?;
        }
        if let Some(secs) = args.timeout_secs {
            dial.timeout = Duration::from_secs(secs);
        }
        if args.blocking {
            dial.stream = false;
        }
        if args.verbose {
            dial.verbose = true;
        }
        dial.endpoint_url()?;

        Ok(ChatConfig {
            dial,
            use_color: !args.no_color,
        })
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{API_KEY_ENV, DEFAULT_DEPLOYMENT, DEPLOYMENT_ENV};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::resolve_with(ChatArgs::default(), no_env).unwrap();
        assert_eq!(config, ChatConfig::new());
        assert!(config.use_color);
        assert!(config.dial.stream);
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            endpoint: Some("http://localhost:8080".to_string()),
            deployment: Some("gpt-35-turbo".to_string()),
            system: Some("You are helpful.".to_string()),
            transport: Some("raw".to_string()),
            timeout_secs: Some(5),
            blocking: true,
            verbose: true,
            no_color: true,
            ..ChatArgs::default()
        };
        let config = ChatConfig::resolve_with(args, no_env).unwrap();
        assert_eq!(config.dial.endpoint, "http://localhost:8080");
        assert_eq!(config.dial.deployment, "gpt-35-turbo");
        assert_eq!(config.dial.system_prompt, "You are helpful.");
        assert_eq!(config.dial.transport, TransportKind::Raw);
        assert_eq!(config.dial.timeout, Duration::from_secs(5));
        assert!(!config.dial.stream);
        assert!(config.dial.verbose);
        assert!(!config.use_color);
    }

    #[test]
    fn flags_beat_environment() {
        let env = |name: &str| match name {
            API_KEY_ENV => Some("env-key".to_string()),
            DEPLOYMENT_ENV => Some("env-deployment".to_string()),
            _ => None,
        };
        let config = ChatConfig::resolve_with(ChatArgs::default(), env).unwrap();
        assert_eq!(config.dial.deployment, "env-deployment");
        assert_eq!(config.dial.api_key().unwrap(), "env-key");

        let args = ChatArgs {
            deployment: Some(DEFAULT_DEPLOYMENT.to_string()),
            ..ChatArgs::default()
        };
        let config = ChatConfig::resolve_with(args, env).unwrap();
        assert_eq!(config.dial.deployment, DEFAULT_DEPLOYMENT);
    }

    #[test]
    fn invalid_flags_rejected() {
        let args = ChatArgs {
            transport: Some("grpc".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::resolve_with(args, no_env).unwrap_err().is_configuration());

        let args = ChatArgs {
            endpoint: Some("not a url".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::resolve_with(args, no_env).is_err());

        let args = ChatArgs {
            config: Some("/nonexistent/dialchat.yaml".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::resolve_with(args, no_env).is_err());
    }
}
