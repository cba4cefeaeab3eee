//! Delivery capability used by the dispatch loop.

use json2mail_smtp::connection::{connect, connect_tls};
use json2mail_smtp::{Client, Ready, StartTlsPolicy};
use tracing::{debug, info, warn};

use crate::compose::compose;
use crate::error::{ConnectError, SendError};
use crate::mail::Mail;
use crate::options::Options;

/// Port on which the server expects TLS from the first byte.
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Name announced in EHLO.
pub const CLIENT_HOSTNAME: &str = "localhost";

/// Something that can deliver mail records, one at a time.
#[allow(async_fn_in_trait)]
pub trait Sender {
    /// Delivers one record.
    ///
    /// # Errors
    ///
    /// Returns an error if this record could not be delivered. The sender
    /// stays usable for the next record.
    async fn send(&mut self, mail: &Mail) -> Result<(), SendError>;

    /// Ends the session. Failures are logged and ignored.
    async fn close(self)
    where
        Self: Sized;
}

/// Sends over one SMTP session, opened once and reused for every record.
pub struct SmtpSender {
    client: Client<Ready>,
    default_from: String,
}

impl SmtpSender {
    /// Connects, secures and authenticates a session.
    ///
    /// Port 465 uses implicit TLS; any other port starts in plain text and
    /// upgrades with STARTTLS. Without STARTTLS support the connection is
    /// refused unless `allow_insecure` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached, the security policy
    /// cannot be met or authentication fails.
    pub async fn connect(options: &Options) -> Result<Self, ConnectError> {
        let server = &options.server;
        let policy = if options.allow_insecure {
            StartTlsPolicy::Opportunistic
        } else {
            StartTlsPolicy::Mandatory
        };
        info!(%server, ?policy, "connecting to SMTP server");

        let stream = if server.port == IMPLICIT_TLS_PORT {
            connect_tls(&server.host, server.port).await
        } else {
            connect(&server.host, server.port).await
        }
        .map_err(|source| ConnectError::Dial {
            server: server.to_string(),
            source,
        })?;

        let client = Client::from_stream(stream)
            .await?
            .ehlo(CLIENT_HOSTNAME)
            .await?
            .secure(&server.host, policy)
            .await?
            .authenticate(&options.username, &options.password)
            .await?;

        info!(%server, "SMTP session ready");
        Ok(Self::new(client, options.default_from()))
    }

    /// Wraps an established session.
    #[must_use]
    pub fn new(client: Client<Ready>, default_from: impl Into<String>) -> Self {
        Self {
            client,
            default_from: default_from.into(),
        }
    }
}

impl Sender for SmtpSender {
    async fn send(&mut self, mail: &Mail) -> Result<(), SendError> {
        let composed = compose(mail, &self.default_from)?;
        let bytes = composed.message.to_bytes();
        debug!(
            recipients = composed.envelope.recipients().len(),
            bytes = bytes.len(),
            "sending message"
        );
        self.client.send(&composed.envelope, &bytes).await?;
        Ok(())
    }

    async fn close(self) {
        if let Err(err) = self.client.quit().await {
            warn!(error = %err, "failed to close SMTP session");
        }
    }
}

/// Composes every record, attachments included, without any network I/O.
#[derive(Debug, Clone)]
pub struct DryRunSender {
    default_from: String,
}

impl DryRunSender {
    /// Creates a dry-run sender.
    #[must_use]
    pub fn new(default_from: impl Into<String>) -> Self {
        Self {
            default_from: default_from.into(),
        }
    }
}

impl Sender for DryRunSender {
    async fn send(&mut self, mail: &Mail) -> Result<(), SendError> {
        let composed = compose(mail, &self.default_from)?;
        debug!(
            recipients = composed.envelope.recipients().len(),
            bytes = composed.message.to_bytes().len(),
            "dry run: message composed"
        );
        Ok(())
    }

    async fn close(self) {}
}
