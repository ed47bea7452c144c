//! Communication Link Error Types

use errors::{DepoErrorTrait, ErrorCategory};
use thiserror::Error;

/// Result type for depo-comlink operations
pub type Result<T> = std::result::Result<T, ComLinkError>;

/// Communication link errors
#[derive(Debug, Error, Clone)]
pub enum ComLinkError {
    /// Malformed or unexpected frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Device answered with a Modbus exception
    #[error("Modbus exception: function {function:#04X}, code {code:#04X}")]
    Exception { function: u8, code: u8 },

    /// Connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid request arguments
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Start address plus length does not fit the 16-bit address space
    #[error("Address overflow: base {base} + {len} registers exceeds 65535")]
    AddressOverflow { base: u16, len: usize },

    /// One chunk of a multi-chunk transfer failed
    #[error("Chunk {index} at address {address} ({count} registers) failed: {source}")]
    Chunk {
        index: usize,
        address: u16,
        count: u16,
        #[source]
        source: Box<ComLinkError>,
    },

    /// The operation was cancelled between or during chunks
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for ComLinkError {
    fn from(err: std::io::Error) -> Self {
        ComLinkError::Io(err.to_string())
    }
}

impl ComLinkError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        ComLinkError::Protocol(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        ComLinkError::Connection(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        ComLinkError::Timeout(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ComLinkError::InvalidRequest(msg.into())
    }

    /// Innermost error, unwrapping chunk context
    pub fn root(&self) -> &ComLinkError {
        match self {
            ComLinkError::Chunk { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error indicates a need for reconnection
    pub fn needs_reconnect(&self) -> bool {
        match self.root() {
            ComLinkError::Io(_) | ComLinkError::Connection(_) | ComLinkError::NotConnected => {
                true
            },
            // A late response may still be in flight on the socket
            ComLinkError::Timeout(_) => true,
            _ => false,
        }
    }
}

impl DepoErrorTrait for ComLinkError {
    fn error_code(&self) -> &'static str {
        match self {
            ComLinkError::Protocol(_) => "COMLINK_PROTOCOL",
            ComLinkError::Exception { .. } => "COMLINK_EXCEPTION",
            ComLinkError::Connection(_) => "COMLINK_CONNECTION",
            ComLinkError::NotConnected => "COMLINK_NOT_CONNECTED",
            ComLinkError::Io(_) => "COMLINK_IO",
            ComLinkError::Timeout(_) => "COMLINK_TIMEOUT",
            ComLinkError::InvalidRequest(_) => "COMLINK_INVALID_REQUEST",
            ComLinkError::AddressOverflow { .. } => "COMLINK_ADDRESS_OVERFLOW",
            ComLinkError::Chunk { source, .. } => source.error_code(),
            ComLinkError::Cancelled => "COMLINK_CANCELLED",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            ComLinkError::Timeout(_) => ErrorCategory::Timeout,
            ComLinkError::InvalidRequest(_) | ComLinkError::AddressOverflow { .. } => {
                ErrorCategory::Configuration
            },
            ComLinkError::Chunk { source, .. } => source.category(),
            ComLinkError::Cancelled => ErrorCategory::Cancelled,
            _ => ErrorCategory::Transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_error_reports_root_cause() {
        let err = ComLinkError::Chunk {
            index: 1,
            address: 123,
            count: 123,
            source: Box::new(ComLinkError::timeout("no response")),
        };
        assert!(matches!(err.root(), ComLinkError::Timeout(_)));
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert_eq!(err.error_code(), "COMLINK_TIMEOUT");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("address 123"));
    }

    #[test]
    fn test_cancelled_is_not_retryable() {
        assert_eq!(ComLinkError::Cancelled.category(), ErrorCategory::Cancelled);
        assert!(!ComLinkError::Cancelled.is_retryable());
        assert!(!ComLinkError::Cancelled.needs_reconnect());
    }
}
