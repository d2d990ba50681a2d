// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public error type for port, negotiation and configuration operations.
//!
//! Transport-level failures have their own enum ([`TransportError`]) because
//! they are raised per connection and folded into [`Error::Delivery`] by the
//! ports.

use crate::stream::TransportError;

/// Errors surfaced by the data plane API.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Nil handle, unreachable object, wrong interface, or unknown connection id.
    InvalidConnection(String),
    /// A transport manager could not build a transport for a connection.
    ///
    /// The negotiator logs these and falls back; callers only see them when
    /// driving a manager directly.
    TransportNegotiation(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// One or more connections failed while delivering a packet.
    Delivery {
        stream_id: String,
        failures: Vec<(String, TransportError)>,
    },
    /// Signal descriptor rejected (e.g., empty stream id).
    InvalidDescriptor(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration value could not be parsed or is out of range.
    Config(String),
    /// Configuration file not found at specified path.
    ConfigFileNotFound(String),
    /// I/O error with underlying cause.
    IoError(std::io::Error),
}

impl Error {
    /// True when the error came from packet delivery rather than the API call.
    pub fn is_delivery(&self) -> bool {
        matches!(self, Error::Delivery { .. })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConnection(msg) => write!(f, "Invalid connection: {}", msg),
            Error::TransportNegotiation(msg) => {
                write!(f, "Transport negotiation failed: {}", msg)
            }
            Error::Delivery {
                stream_id,
                failures,
            } => {
                write!(
                    f,
                    "Delivery failed for stream '{}' on {} connection(s)",
                    stream_id,
                    failures.len()
                )?;
                for (connection_id, err) in failures {
                    write!(f, "; {}: {}", connection_id, err)?;
                }
                Ok(())
            }
            Error::InvalidDescriptor(msg) => write!(f, "Invalid signal descriptor: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::ConfigFileNotFound(path) => write!(f, "Config file not found: {}", path),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
