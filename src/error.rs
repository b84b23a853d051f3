// Error types for calls against the Alloy API
//
// Only transport failures and non-success HTTP statuses are retried. A
// response the API itself marks as failed is handed back to the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single logical API call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response reached the client (connection refused, DNS, timeout).
    #[error("call interrupted, no response from {url}: {message}")]
    NoResponse { url: String, message: String },

    /// A response arrived with a non-success status.
    #[error("HTTP error {status}: {description}")]
    Http { status: u16, description: String },

    /// The envelope parsed but reported `success = false`.
    #[error("API reported failure (code {code}): {text}")]
    Rejected { code: String, text: String },

    #[error("malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("token grant rejected: {0}")]
    InvalidGrant(String),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Whether the invoker should try the call again.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::NoResponse { .. } | Self::Http { .. })
    }

    /// Whether the failure came from the transport rather than from the API's
    /// own verdict on the request.
    pub fn is_interruption(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}
