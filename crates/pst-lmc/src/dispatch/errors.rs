//! Error types for request dispatch failures.

use std::io;

use pst_lmc_types::RpcError;
use thiserror::Error;

/// Errors surfaced while reading, parsing, or answering a request line.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Request line could not be parsed as a known call.
    #[error("malformed request: {message}")]
    MalformedJsonl {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Request exceeds the maximum allowed size.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge { size: usize, max_size: usize },

    /// IO error during read or write.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Response serialization failed.
    #[error("failed to serialize response: {0}")]
    SerializeResponse(#[from] serde_json::Error),
}

impl DispatchError {
    /// Creates a malformed request error from a serde error.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedJsonl {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed request error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJsonl {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a request too large error.
    pub fn request_too_large(size: usize, max_size: usize) -> Self {
        Self::RequestTooLarge { size, max_size }
    }

    /// Converts the failure into the structured error returned to clients.
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::MalformedJsonl { .. } | Self::RequestTooLarge { .. } => {
                RpcError::invalid_argument(self.to_string())
            }
            Self::Io(_) | Self::SerializeResponse(_) => RpcError::internal(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pst_lmc_types::RpcStatus;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::malformed(DispatchError::malformed("empty request line"), RpcStatus::InvalidArgument)]
    #[case::too_large(DispatchError::request_too_large(10, 5), RpcStatus::InvalidArgument)]
    #[case::io(
        DispatchError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone")),
        RpcStatus::Internal
    )]
    fn maps_to_rpc_status(#[case] error: DispatchError, #[case] status: RpcStatus) {
        let rpc_error = error.to_rpc_error();
        assert_eq!(rpc_error.status, status);
        assert_eq!(rpc_error.message, error.to_string());
    }
}
