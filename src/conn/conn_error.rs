use std::fmt;
use std::io;
use std::sync::Arc;

use crate::wire::{DecodeError, EncodeError};

/// A server-reported failure tied to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    /// Error-kind code from the error message's detail byte.
    pub error_code: u8,

    /// Full-width sequence number of the offending request.
    pub sequence: u64,

    /// The raw error message as read off the wire.
    pub raw: Vec<u8>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "server error {} for request {}",
            self.error_code, self.sequence
        )
    }
}

impl std::error::Error for ProtocolError {}

/// Failure of a connection-layer operation, from the caller's perspective.
#[derive(Debug, Clone)]
pub enum ConnError {
    /// The request data was inconsistent; nothing was transmitted.
    Encode(EncodeError),

    /// An incoming message could not be decoded.
    Decode(DecodeError),

    /// The server rejected the request.
    Protocol(ProtocolError),

    /// The server does not support the named extension.
    ExtensionMissing(&'static str),

    /// The transport failed; every in-flight and future call on this
    /// connection resolves to this same outcome.
    Shutdown(Arc<io::Error>),
}

impl fmt::Display for ConnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnError::Encode(e) => write!(f, "encode error: {e}"),
            ConnError::Decode(e) => write!(f, "decode error: {e}"),
            ConnError::Protocol(e) => write!(f, "{e}"),
            ConnError::ExtensionMissing(name) => {
                write!(f, "extension {name:?} is not present on the server")
            }
            ConnError::Shutdown(e) => write!(f, "connection shut down: {e}"),
        }
    }
}

impl std::error::Error for ConnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnError::Encode(e) => Some(e),
            ConnError::Decode(e) => Some(e),
            ConnError::Protocol(e) => Some(e),
            ConnError::Shutdown(e) => Some(e.as_ref()),
            ConnError::ExtensionMissing(_) => None,
        }
    }
}

impl From<EncodeError> for ConnError {
    fn from(e: EncodeError) -> Self {
        ConnError::Encode(e)
    }
}

impl From<DecodeError> for ConnError {
    fn from(e: DecodeError) -> Self {
        ConnError::Decode(e)
    }
}
