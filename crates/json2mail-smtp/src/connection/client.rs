//! Type-state SMTP client.

use super::{Envelope, ServerInfo, SmtpStream, StartTlsPolicy};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashSet;
use std::marker::PhantomData;

/// Type-state marker: greeted, session not yet usable for mail.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: session set up (secured/authenticated as configured)
/// and ready to carry any number of mail transactions.
#[derive(Debug)]
pub struct Ready;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    client_hostname: String,
    _state: PhantomData<State>,
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses service.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        let hostname = greeting
            .lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!(server = %hostname, "received greeting");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            client_hostname: String::from("localhost"),
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        self.client_hostname = client_hostname.to_string();
        self.refresh_extensions().await?;
        Ok(self)
    }

    /// Applies the STARTTLS policy.
    ///
    /// An already encrypted stream (implicit TLS) is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StartTlsUnsupported`] when the policy is mandatory and
    /// the server does not offer STARTTLS, or any error of the upgrade itself.
    pub async fn secure(self, server_hostname: &str, policy: StartTlsPolicy) -> Result<Self> {
        if self.stream.is_tls() {
            return Ok(self);
        }
        if self.server_info.supports_starttls() {
            return self.starttls(server_hostname).await;
        }
        match policy {
            StartTlsPolicy::Mandatory => Err(Error::StartTlsUnsupported),
            StartTlsPolicy::Opportunistic => {
                tracing::warn!(
                    server = %self.server_info.hostname,
                    "server does not offer STARTTLS, continuing without encryption"
                );
                Ok(self)
            }
        }
    }

    /// Upgrades the connection to TLS using STARTTLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not offered or the upgrade fails.
    pub async fn starttls(mut self, server_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::StartTlsUnsupported);
        }

        self.send_command(Command::StartTls)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;
        self.stream = self.stream.upgrade_to_tls(server_hostname).await?;
        tracing::debug!(server = %server_hostname, "STARTTLS upgrade complete");

        // Capabilities learned before the upgrade must be discarded (RFC 3207).
        self.refresh_extensions().await?;
        Ok(self)
    }

    /// Authenticates with the best mechanism the server offers.
    ///
    /// PLAIN is preferred, LOGIN is the fallback. A server that does not
    /// advertise AUTH at all is used without authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable mechanism is offered or the server
    /// rejects the credentials.
    pub async fn authenticate(self, username: &str, password: &str) -> Result<Client<Ready>> {
        let chosen = match self.server_info.auth_mechanisms() {
            None => None,
            Some(offered) if offered.is_empty() || offered.contains(&AuthMechanism::Plain) => {
                Some(AuthMechanism::Plain)
            }
            Some(offered) if offered.contains(&AuthMechanism::Login) => Some(AuthMechanism::Login),
            Some(offered) => {
                let names: Vec<&str> = offered.iter().map(|m| m.as_str()).collect();
                return Err(Error::NoAuthMechanism(names.join(" ")));
            }
        };

        match chosen {
            Some(AuthMechanism::Plain) => self.auth_plain(username, password).await,
            Some(_) => self.auth_login(username, password).await,
            None => {
                tracing::debug!("server does not advertise AUTH, skipping authentication");
                Ok(self.ready())
            }
        }
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(mut self, username: &str, password: &str) -> Result<Client<Ready>> {
        let credentials = format!("\0{username}\0{password}");
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(STANDARD.encode(credentials.as_bytes())),
        };

        self.send_command(cmd)
            .await?
            .expect_code(ReplyCode::AUTH_SUCCEEDED)?;
        tracing::debug!(%username, "authenticated with PLAIN");
        Ok(self.ready())
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_login(mut self, username: &str, password: &str) -> Result<Client<Ready>> {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        self.send_command(cmd)
            .await?
            .expect_code(ReplyCode::AUTH_CONTINUE)?;

        let user = Command::AuthResponse(STANDARD.encode(username.as_bytes()));
        self.send_command(user)
            .await?
            .expect_code(ReplyCode::AUTH_CONTINUE)?;

        let pass = Command::AuthResponse(STANDARD.encode(password.as_bytes()));
        self.send_command(pass)
            .await?
            .expect_code(ReplyCode::AUTH_SUCCEEDED)?;
        tracing::debug!(%username, "authenticated with LOGIN");
        Ok(self.ready())
    }

    /// Finishes setup without authentication.
    #[must_use]
    pub fn ready(self) -> Client<Ready> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            client_hostname: self.client_hostname,
            _state: PhantomData,
        }
    }

    async fn refresh_extensions(&mut self) -> Result<()> {
        let cmd = Command::Ehlo {
            hostname: self.client_hostname.clone(),
        };
        let reply = self.send_command(cmd).await?.expect_success()?;

        // First line is the server's greeting text, the rest are keywords.
        self.server_info.extensions = reply
            .lines
            .iter()
            .skip(1)
            .map(String::as_str)
            .map(Extension::parse)
            .collect();
        Ok(())
    }
}

impl Client<Ready> {
    /// Runs one complete mail transaction: MAIL FROM, RCPT TO for each
    /// recipient, DATA and the message content.
    ///
    /// Line endings are normalized to CRLF, leading dots are stuffed, and the
    /// terminating `.` line is added. When the server rejects a step the
    /// transaction is reset, so the session stays usable for the next call.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is too large for the server, a
    /// command is rejected, or the connection fails.
    pub async fn send(&mut self, envelope: &Envelope, message: &[u8]) -> Result<()> {
        if let Some(limit) = self.server_info.max_message_size()
            && limit > 0
            && message.len() > limit
        {
            return Err(Error::MessageTooLarge {
                size: message.len(),
                limit,
            });
        }

        match self.transaction(envelope, message).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                if let Err(reset) = self.send_command(Command::Rset).await {
                    tracing::warn!(error = %reset, "RSET after failed transaction failed");
                }
                Err(err)
            }
        }
    }

    /// Sends NOOP, useful to check that the session is still alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer with 2xx.
    pub async fn noop(&mut self) -> Result<()> {
        self.send_command(Command::Noop).await?.expect_success()?;
        Ok(())
    }

    async fn transaction(&mut self, envelope: &Envelope, message: &[u8]) -> Result<()> {
        let size = self.server_info.supports_size().then_some(message.len());
        self.send_command(Command::MailFrom {
            from: envelope.from().clone(),
            size,
        })
        .await?
        .expect_success()?;

        for to in envelope.recipients() {
            self.send_command(Command::RcptTo { to: to.clone() })
                .await?
                .expect_success()?;
        }

        self.send_command(Command::Data)
            .await?
            .expect_code(ReplyCode::START_DATA)?;

        self.stream.write_all(&dot_stuff(message)).await?;
        read_reply(&mut self.stream).await?.expect_success()?;

        tracing::debug!(
            from = %envelope.from(),
            recipients = envelope.recipients().len(),
            bytes = message.len(),
            "message accepted"
        );
        Ok(())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    /// Returns what the server advertised.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        self.send_command(Command::Quit)
            .await?
            .expect_code(ReplyCode::CLOSING)?;
        Ok(())
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        tracing::trace!(command = ?cmd, "sending");
        self.stream.write_all(&cmd.serialize()).await?;
        read_reply(&mut self.stream).await
    }
}

async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
    }

    let reply = parse_reply(&lines)?;
    tracing::trace!(code = %reply.code, "reply");
    Ok(reply)
}

/// Normalizes line endings to CRLF, stuffs leading dots and appends the
/// `.` terminator.
fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);
    let body = message.strip_suffix(b"\n").unwrap_or(message);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dot_stuff_normalizes_line_endings() {
        assert_eq!(dot_stuff(b"a\nb\r\nc"), b"a\r\nb\r\nc\r\n.\r\n");
    }

    #[test]
    fn dot_stuff_escapes_leading_dots() {
        assert_eq!(dot_stuff(b".hidden\r\n..\r\n"), b"..hidden\r\n...\r\n.\r\n");
    }

    #[test]
    fn dot_stuff_keeps_inner_blank_lines() {
        assert_eq!(
            dot_stuff(b"Subject: x\r\n\r\nbody\r\n"),
            b"Subject: x\r\n\r\nbody\r\n.\r\n"
        );
    }

    #[test]
    fn dot_stuff_empty_message() {
        assert_eq!(dot_stuff(b""), b".\r\n");
    }
}
