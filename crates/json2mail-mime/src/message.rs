//! Message generation.

use crate::content_type::ContentType;
use crate::encoding::{encode_base64_lines, encode_quoted_printable, encode_rfc2047, fold_text};
use crate::error::{Error, Result};
use crate::header::Headers;
use chrono::{DateTime, FixedOffset, Local};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::path::Path;

/// Headers that address recipients but must never be transmitted.
const HIDDEN_HEADERS: &[&str] = &["Bcc"];

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    filename: String,
    content_type: ContentType,
    data: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment from memory.
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: ContentType, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data,
        }
    }

    /// Reads a file; its name and extension give the filename and type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Attachment`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::Attachment {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());

        Ok(Self::new(filename, ContentType::from_path(path), data))
    }

    /// File name shown to the recipient.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Content type of the part.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Raw (unencoded) content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Builder for a plain-text message with optional attachments.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    headers: Headers,
    text: String,
    attachments: Vec<Attachment>,
    boundary: Option<String>,
    date: Option<DateTime<FixedOffset>>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `From` header (already formatted mailbox).
    #[must_use]
    pub fn from(self, value: impl Into<String>) -> Self {
        self.header("From", value)
    }

    /// Sets the `To` header (already formatted mailbox list).
    #[must_use]
    pub fn to(self, value: impl Into<String>) -> Self {
        self.header("To", value)
    }

    /// Sets the `Cc` header.
    #[must_use]
    pub fn cc(self, value: impl Into<String>) -> Self {
        self.header("Cc", value)
    }

    /// Records `Bcc`; it stays in [`Message::headers`] but is not transmitted.
    #[must_use]
    pub fn bcc(self, value: impl Into<String>) -> Self {
        self.header("Bcc", value)
    }

    /// Sets the subject, RFC 2047 encoding it when needed and folding long
    /// plain text.
    #[must_use]
    pub fn subject(self, text: &str) -> Self {
        let encoded = encode_rfc2047(text);
        let value = if encoded == text {
            fold_text("Subject: ".len(), text)
        } else {
            encoded
        };
        self.header("Subject", value)
    }

    /// Sets an arbitrary header, replacing a previous value.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Fixes the `Date` header instead of using the current local time.
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Fixes the multipart boundary instead of generating a random one.
    #[must_use]
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns an error if `From` or `To` is missing or a header value
    /// contains a bare line break.
    pub fn build(self) -> Result<Message> {
        for required in ["From", "To"] {
            if !self.headers.contains(required) {
                return Err(Error::MissingHeader(required.to_string()));
            }
        }

        let mut headers = self.headers;
        let date = self.date.unwrap_or_else(|| Local::now().fixed_offset());
        headers.set("Date", date.to_rfc2822());
        headers.set("MIME-Version", "1.0");

        let mut text = encode_quoted_printable(&self.text);
        if !text.is_empty() && !text.ends_with("\r\n") {
            text.push_str("\r\n");
        }

        let body = if self.attachments.is_empty() {
            headers.set("Content-Type", ContentType::text_plain().to_string());
            headers.set("Content-Transfer-Encoding", "quoted-printable");
            text.into_bytes()
        } else {
            let boundary = self.boundary.unwrap_or_else(random_boundary);
            headers.set(
                "Content-Type",
                ContentType::multipart_mixed(boundary.as_str()).to_string(),
            );
            multipart_body(&boundary, &text, &self.attachments)
        };

        headers.validate()?;
        Ok(Message { headers, body })
    }
}

/// A complete message: header block and encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    headers: Headers,
    body: Vec<u8>,
}

impl Message {
    /// All headers, including ones that are not transmitted.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Encoded body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Wire form of the message, without `Bcc`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 512);
        self.headers.write_to(&mut out, HIDDEN_HEADERS);
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

fn multipart_body(boundary: &str, text: &str, attachments: &[Attachment]) -> Vec<u8> {
    let mut body = String::new();

    let mut part = Headers::new();
    part.add("Content-Type", ContentType::text_plain().to_string());
    part.add("Content-Transfer-Encoding", "quoted-printable");
    // A non-empty text already ends with CRLF.
    body.push_str(&format!("--{boundary}\r\n{part}\r\n{text}"));
    if text.is_empty() {
        body.push_str("\r\n");
    }

    for attachment in attachments {
        let filename = encode_rfc2047(attachment.filename());
        let content_type = attachment
            .content_type()
            .clone()
            .with_parameter("name", filename.as_str());

        let mut part = Headers::new();
        part.add("Content-Type", content_type.to_string());
        part.add(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", filename.replace('"', "\\\"")),
        );
        part.add("Content-Transfer-Encoding", "base64");

        body.push_str(&format!(
            "--{boundary}\r\n{part}\r\n{}\r\n",
            encode_base64_lines(attachment.data())
        ));
    }

    body.push_str(&format!("--{boundary}--\r\n"));
    body.into_bytes()
}

fn random_boundary() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(28)
        .map(char::from)
        .collect();
    format!("json2mail-{token}")
}
