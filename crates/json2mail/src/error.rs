//! Errors raised while delivering mail.

use thiserror::Error;

/// Failure to send one record. The dispatch loop logs it and moves on.
#[derive(Debug, Error)]
pub enum SendError {
    /// The configured default sender is not a usable address.
    #[error("invalid sender {address:?}: {source}")]
    Sender {
        /// The rejected sender text.
        address: String,
        /// Why it was rejected.
        #[source]
        source: json2mail_smtp::Error,
    },

    /// The message could not be built, e.g. an attachment is unreadable.
    #[error(transparent)]
    Message(#[from] json2mail_mime::Error),

    /// The server refused the transaction or the connection failed.
    #[error(transparent)]
    Smtp(#[from] json2mail_smtp::Error),
}

/// Failure to set up the SMTP session. Fatal: no record is sent.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// STARTTLS is required but the server does not offer it.
    #[error(
        "this server does not support a secure connection; use --allow-insecure to send without encryption"
    )]
    TlsUnsupported,

    /// The server could not be reached.
    #[error("cannot reach {server}: {source}")]
    Dial {
        /// `host:port` that was dialed.
        server: String,
        /// Underlying error.
        #[source]
        source: json2mail_smtp::Error,
    },

    /// Greeting, EHLO, TLS or authentication failed.
    #[error(transparent)]
    Smtp(json2mail_smtp::Error),
}

impl From<json2mail_smtp::Error> for ConnectError {
    fn from(err: json2mail_smtp::Error) -> Self {
        match err {
            json2mail_smtp::Error::StartTlsUnsupported => Self::TlsUnsupported,
            other => Self::Smtp(other),
        }
    }
}
