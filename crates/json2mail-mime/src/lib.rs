//! # json2mail-mime
//!
//! Generation of RFC 5322 messages with MIME bodies.
//!
//! ## Features
//!
//! - **Ordered headers**: written in the order they were added
//! - **Header encoding**: RFC 2047 encoded words for non-ASCII text
//! - **Bodies**: `text/plain` in quoted-printable
//! - **Attachments**: `multipart/mixed` with base64 parts typed by file extension
//!
//! ## Quick Start
//!
//! ```ignore
//! use json2mail_mime::{Attachment, MessageBuilder};
//!
//! let message = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Document")
//!     .text_body("Please find the attached document.")
//!     .attach(Attachment::from_file("document.pdf")?)
//!     .build()?;
//!
//! let wire: Vec<u8> = message.to_bytes();
//! ```
//!
//! `Bcc` may be set on the builder so callers can inspect it, but it is
//! never part of [`Message::to_bytes`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Attachment, Message, MessageBuilder};
