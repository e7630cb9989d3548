//! `resilient-http` is an async HTTP client for unreliable upstream services.
//!
//! [`HttpClient`] retries transient failures with configurable backoff and
//! replays buffered request bodies byte-for-byte:
//! - [`HttpClient::send`] and the `get`/`post`/`put`/`delete`/`patch` shortcuts
//!   return the final response
//! - [`HttpClient::send_json`] and the `*_json` shortcuts check for `2xx` and
//!   decode JSON; bodies are raw JSON text or a value wrapped in [`Json`]
//!
//! With the `gateway` feature (on by default), [`SigningClient`] builds
//! HMAC-SHA256 signed envelopes for the partner gateway.

#![warn(missing_docs)]

mod backoff;
mod body;
mod client;
mod error;
mod json;
mod options;
mod request;
mod retry;

#[cfg(feature = "gateway")]
mod gateway;
#[cfg(feature = "gateway")]
pub mod requests;
#[cfg(feature = "gateway")]
pub mod signature;
#[cfg(feature = "gateway")]
mod wire;

pub use backoff::backoff_delay;
pub use body::{IntoJsonBody, Json, RequestBody};
pub use client::HttpClient;
pub use error::ClientError;
pub use options::ClientOptions;
pub use request::HttpRequest;
pub use retry::{BackoffStrategy, DefaultRetryPolicy, FailureKind, Outcome, RetryConfig, RetryPolicy};

#[cfg(feature = "gateway")]
pub use gateway::{GatewayConfig, GatewayRequest, SigningClient};
#[cfg(feature = "gateway")]
pub use wire::{Envelope, GatewayResponse};

pub use tokio_util::sync::CancellationToken;

/// Result type returned by this crate.
pub type Result<T> = std::result::Result<T, ClientError>;
