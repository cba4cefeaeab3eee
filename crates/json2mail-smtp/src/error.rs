//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server answered with a non-success reply.
    #[error("SMTP error {code}: {message}")]
    Rejected {
        /// Reply code (e.g., 550).
        code: u16,
        /// Reply text from the server.
        message: String,
    },

    /// Malformed or unexpected server response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Invalid email address or mailbox.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// STARTTLS is mandatory but the server does not offer it.
    #[error(
        "server does not support a secure connection; use --allow-insecure to send without encryption"
    )]
    StartTlsUnsupported,

    /// Server does not advertise an authentication mechanism we can use.
    #[error("No supported authentication mechanism (server offers: {0})")]
    NoAuthMechanism(String),

    /// Message exceeds the size advertised by the server.
    #[error("Message exceeds size limit: {size} bytes (limit {limit})")]
    MessageTooLarge {
        /// Size of the rejected message.
        size: usize,
        /// Limit advertised with the SIZE extension.
        limit: usize,
    },
}

impl Error {
    /// Creates a rejection error from a reply code and message.
    #[must_use]
    pub fn rejected(code: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent rejection (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient rejection (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if *code >= 400 && *code < 500)
    }

    /// Returns true if the connection can no longer carry commands.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::ConnectionClosed | Self::Rejected { code: 421, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reply_codes() {
        assert!(Error::rejected(550, "no such user").is_permanent());
        assert!(Error::rejected(451, "try later").is_transient());
        assert!(!Error::rejected(451, "try later").is_permanent());
    }

    #[test]
    fn service_unavailable_is_fatal() {
        assert!(Error::rejected(421, "closing").is_fatal());
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(!Error::rejected(550, "nope").is_fatal());
    }

    #[test]
    fn rejection_display_includes_code() {
        let err = Error::rejected(554, "Transaction failed");
        assert_eq!(err.to_string(), "SMTP error 554: Transaction failed");
    }
}
