// Public modules
pub mod accumulating_stream;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod config;
pub mod error;
pub mod observability;
pub mod raw_client;
pub mod render;
pub mod sse;
pub mod transport;
pub mod types;

// Re-exports
pub use accumulating_stream::AccumulatingStream;
pub use client::DialClient;
pub use client_logger::{ClientLogger, StderrLogger};
pub use config::{ConfigFile, DialConfig, completions_url};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use raw_client::RawHttpClient;
pub use render::{PlainTextRenderer, Renderer};
pub use sse::{StreamLine, assemble, decode_line, decode_stream};
pub use transport::{
    CompletionTransport, FragmentStream, TransportKind, build_transport, complete,
};
pub use types::*;
