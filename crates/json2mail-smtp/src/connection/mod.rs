//! SMTP connection management with type-state setup.

mod client;
mod stream;

pub use client::{Client, Connected, Ready};
pub use stream::{SmtpStream, connect, connect_tls};

use crate::error::{Error, Result};
use crate::types::{Address, AuthMechanism, Extension};
use std::collections::HashSet;

/// What to do when the server does not offer STARTTLS on a plain connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartTlsPolicy {
    /// Refuse to continue without encryption.
    #[default]
    Mandatory,
    /// Upgrade when offered, otherwise continue in plain text.
    Opportunistic,
}

/// Server capabilities from the greeting and EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns true if the SIZE extension is advertised at all.
    #[must_use]
    pub fn supports_size(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Size(_)))
    }

    /// Returns the advertised authentication mechanisms, or `None` when the
    /// server does not advertise AUTH.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Option<&[AuthMechanism]> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Auth(mechanisms) => Some(mechanisms.as_slice()),
            _ => None,
        })
    }
}

/// Envelope of one mail transaction: reverse path and forward paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    from: Address,
    recipients: Vec<Address>,
}

impl Envelope {
    /// Creates an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] when `recipients` is empty.
    pub fn new(from: Address, recipients: Vec<Address>) -> Result<Self> {
        if recipients.is_empty() {
            return Err(Error::InvalidAddress(
                "envelope needs at least one recipient".into(),
            ));
        }
        Ok(Self { from, recipients })
    }

    /// Envelope sender.
    #[must_use]
    pub const fn from(&self) -> &Address {
        &self.from
    }

    /// Envelope recipients, in RCPT TO order.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn info(lines: &[&str]) -> ServerInfo {
        ServerInfo {
            hostname: "mx.example.com".into(),
            extensions: lines.iter().map(|l| Extension::parse(l)).collect(),
        }
    }

    #[test]
    fn capabilities_lookup() {
        let server = info(&["STARTTLS", "SIZE 1000", "AUTH PLAIN LOGIN"]);
        assert!(server.supports_starttls());
        assert!(server.supports_size());
        assert_eq!(server.max_message_size(), Some(1000));
        assert_eq!(
            server.auth_mechanisms(),
            Some(&[AuthMechanism::Plain, AuthMechanism::Login][..])
        );
    }

    #[test]
    fn missing_capabilities() {
        let server = info(&["PIPELINING"]);
        assert!(!server.supports_starttls());
        assert!(!server.supports_size());
        assert_eq!(server.max_message_size(), None);
        assert_eq!(server.auth_mechanisms(), None);
    }

    #[test]
    fn envelope_requires_recipient() {
        let from = Address::new("a@example.com").unwrap();
        assert!(Envelope::new(from.clone(), vec![]).is_err());

        let envelope = Envelope::new(from, vec![Address::new("b@example.com").unwrap()]).unwrap();
        assert_eq!(envelope.from().as_str(), "a@example.com");
        assert_eq!(envelope.recipients().len(), 1);
    }

    #[test]
    fn default_policy_is_mandatory() {
        assert_eq!(StartTlsPolicy::default(), StartTlsPolicy::Mandatory);
    }
}
