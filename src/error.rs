/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network or request execution error from `reqwest` that the retry
    /// policy classified as not worth retrying.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Transport kept failing through the final attempt.
    #[error("maximum number of retries reached after {attempts} attempts: {source}")]
    MaxRetriesReached {
        /// Total attempts issued, including the first send.
        attempts: u32,
        /// Error observed on the final attempt.
        source: reqwest::Error,
    },
    /// Final HTTP status outside `2xx`, with the raw response body.
    #[error("invalid response: status code {status}, body: {body}")]
    InvalidResponse {
        /// Final HTTP status code.
        status: u16,
        /// Full response body.
        body: String,
    },
    /// A retry was needed but the request body was a one-shot stream.
    #[error("cannot retry request: body is not replayable")]
    BodyNotReplayable,
    /// Response JSON did not match the requested type.
    #[error("decode error: {0}")]
    Decode(String),
    /// Request body could not be serialized to JSON.
    #[error("failed to marshal body: {0}")]
    Marshal(serde_json::Error),
    /// HMAC signature could not be computed.
    #[error("signature error: {0}")]
    Signature(String),
    /// Request could not be built (bad URL, header name or value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The caller-supplied deadline elapsed mid-request or mid-backoff.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// The caller-supplied cancellation token fired.
    #[error("request cancelled")]
    Cancelled,
    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Returns the HTTP status carried by an [`ClientError::InvalidResponse`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` when the call was aborted by its deadline or token.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }
}
