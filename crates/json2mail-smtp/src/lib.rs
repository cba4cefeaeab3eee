//! # json2mail-smtp
//!
//! A compact SMTP submission client (RFC 5321) used by `json2mail` to deliver
//! one message after another over a single connection.
//!
//! ## Features
//!
//! - **Type-state setup**: greeting, EHLO, STARTTLS and AUTH are ordered at
//!   compile time; only an [`Client<Ready>`] can send mail
//! - **STARTTLS policy**: mandatory or opportunistic upgrade, plus implicit TLS
//! - **Authentication**: PLAIN and LOGIN
//! - **Reusable sessions**: a rejected transaction is reset with RSET so the
//!   connection stays usable for the next message
//!
//! ## Quick Start
//!
//! ```ignore
//! use json2mail_smtp::{Address, Client, Envelope, StartTlsPolicy};
//! use json2mail_smtp::connection::connect;
//!
//! #[tokio::main]
//! async fn main() -> json2mail_smtp::Result<()> {
//!     let stream = connect("smtp.example.com", 587).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client
//!         .ehlo("localhost")
//!         .await?
//!         .secure("smtp.example.com", StartTlsPolicy::Mandatory)
//!         .await?;
//!     let mut client = client.authenticate("user@example.com", "password").await?;
//!
//!     let envelope = Envelope::new(
//!         Address::new("user@example.com")?,
//!         vec![Address::new("friend@example.com")?],
//!     )?;
//!     client
//!         .send(&envelope, b"Subject: Hi\r\n\r\nHello!\r\n")
//!         .await?;
//!
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐  ehlo() / secure()   ┌──────────┐  send() ─┐
//! │  Connected   │ ── authenticate() ─→ │  Ready   │ ←────────┘
//! └──────────────┘ ──── ready() ──────→ └──────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Client, Connected, Envelope, Ready, ServerInfo, StartTlsPolicy};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Mailbox, Reply, ReplyCode};
