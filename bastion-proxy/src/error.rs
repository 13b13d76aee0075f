//! Connection-level failure taxonomy.

use std::io;
use std::time::Duration;

use bastion_core::domain::request::RequestLineError;
use thiserror::Error;

/// Why a connection ended without a normal response.
///
/// Rejections that carry a literal response (rate limited, no servers available)
/// are not errors; they are reported as handler outcomes.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The client did not send a complete request before the read deadline.
    #[error("client did not send a request within {0:?}")]
    ClientTimeout(Duration),

    /// The client closed the connection without sending anything.
    #[error("client closed the connection without a request")]
    EmptyRequest,

    /// The request grew beyond the configured size limit.
    #[error("request exceeds {limit} bytes")]
    RequestTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The request line could not be parsed.
    #[error(transparent)]
    Malformed(#[from] RequestLineError),

    /// Connecting to or exchanging data with a backend failed.
    #[error("backend {backend} unreachable: {source}")]
    BackendUnreachable {
        /// `host:port` of the backend.
        backend: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A backend did not connect or answer before its deadline.
    #[error("backend {backend} did not respond within {timeout:?}")]
    BackendTimeout {
        /// `host:port` of the backend.
        backend: String,
        /// The deadline that expired.
        timeout: Duration,
    },

    /// Writing to the client did not finish before the deadline.
    #[error("client write did not finish within {0:?}")]
    ClientWriteTimeout(Duration),

    /// Any other client socket error.
    #[error("client i/o error: {0}")]
    Io(#[from] io::Error),
}

impl HandlerError {
    /// Client-side faults that are routine and only worth a debug line.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            HandlerError::ClientTimeout(_)
                | HandlerError::EmptyRequest
                | HandlerError::RequestTooLarge { .. }
                | HandlerError::Malformed(_)
                | HandlerError::ClientWriteTimeout(_)
                | HandlerError::Io(_)
        )
    }
}
