//! Streaming decoder turning a byte stream into mail records.
//!
//! The input is a sequence of JSON values separated by optional whitespace.
//! Values do not need to be wrapped in an array, but a top-level array is
//! accepted and its elements are yielded one at a time, so both of these
//! produce two records:
//!
//! ```text
//! {"to": "a@example.com"} {"to": "b@example.com"}
//! [{"to": "a@example.com"}, {"to": "b@example.com"}]
//! ```
//!
//! Each value is read with a streaming `serde_json` deserializer that stops
//! at the value's last byte, so nothing past it is consumed and the stream
//! may be unbounded (a pipe, a socket). Syntax errors surface at the
//! offending byte rather than at the end of the input. Every byte handed to
//! the deserializer is recorded for diagnostics.

use std::borrow::Cow;
use std::io::{self, BufRead, Read};

use serde::Deserialize;
use serde_json::Value;
use serde_json::error::Category;
use thiserror::Error;
use tracing::{debug, trace};

use crate::mail::Mail;

/// Terminal scanner failure.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Reading the source failed.
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),

    /// The stream ended inside a value or an enclosing array.
    #[error("unexpected end of input in value starting at byte {offset}")]
    Truncated {
        /// Byte offset where the unfinished value started.
        offset: u64,
    },

    /// The value is not valid JSON.
    #[error("invalid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// The value is valid JSON but does not describe a mail.
    #[error("invalid mail record: {0}")]
    Decode(#[source] serde_json::Error),

    /// Something other than `,` or `]` followed an element of an enclosing array.
    #[error("unexpected {found:?} at byte {offset}, expected ',' or ']'")]
    UnexpectedToken {
        /// The offending character.
        found: char,
        /// Its byte offset.
        offset: u64,
    },
}

/// Where the scanner is in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Between top-level values.
    TopLevel,
    /// Just after the `[` of an enclosing array.
    ArrayOpen,
    /// After a `,` inside an enclosing array; an element must follow.
    ArrayElement,
    /// After an element inside an enclosing array; `,` or `]` must follow.
    ArrayNext,
    /// Exhausted or failed. Never left.
    Finished,
}

/// Forward-only cursor over the mail records of a byte stream.
///
/// Call [`advance`](Self::advance) until it returns false, then check
/// [`error`](Self::error) to tell a clean end from a failure. Once finished
/// the scanner stays finished and never reads from its source again.
#[derive(Debug)]
pub struct MailScanner<R> {
    reader: R,
    phase: Phase,
    raw: Vec<u8>,
    current: Option<Mail>,
    error: Option<ScanError>,
    offset: u64,
    item_offset: u64,
}

impl<R: BufRead> MailScanner<R> {
    /// Creates a scanner reading from `reader`.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            phase: Phase::TopLevel,
            raw: Vec::new(),
            current: None,
            error: None,
            offset: 0,
            item_offset: 0,
        }
    }

    /// Decodes the next record.
    ///
    /// Returns false at the end of the stream or on the first error.
    pub fn advance(&mut self) -> bool {
        self.current = None;
        if self.phase == Phase::Finished {
            return false;
        }
        self.raw.clear();

        match self.next_mail() {
            Ok(Some(mail)) => {
                debug!(offset = self.item_offset, "decoded mail record");
                self.current = Some(mail);
                true
            }
            Ok(None) => {
                debug!(bytes = self.offset, "end of input");
                self.phase = Phase::Finished;
                false
            }
            Err(err) => {
                debug!(offset = self.item_offset, error = %err, "scan failed");
                self.error = Some(err);
                self.phase = Phase::Finished;
                false
            }
        }
    }

    /// Advances and returns the decoded record, or `None` once the stream
    /// is exhausted or has failed.
    pub fn next_record(&mut self) -> Option<&Mail> {
        if self.advance() {
            self.current.as_ref()
        } else {
            None
        }
    }

    /// The record decoded by the last successful [`advance`](Self::advance).
    #[must_use]
    pub const fn current(&self) -> Option<&Mail> {
        self.current.as_ref()
    }

    /// The terminal error, if scanning failed.
    #[must_use]
    pub const fn error(&self) -> Option<&ScanError> {
        self.error.as_ref()
    }

    /// Raw text of the last item read, complete or partial.
    #[must_use]
    pub fn current_raw_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }

    /// Byte offset where the last item started.
    #[must_use]
    pub const fn item_offset(&self) -> u64 {
        self.item_offset
    }

    fn next_mail(&mut self) -> Result<Option<Mail>, ScanError> {
        loop {
            self.skip_whitespace()?;
            let next = self.peek()?;
            self.item_offset = self.offset;

            match (self.phase, next) {
                (Phase::TopLevel, None) => return Ok(None),
                (_, None) => return Err(self.truncated()),
                (Phase::TopLevel, Some(b'[')) => {
                    trace!(offset = self.offset, "entering enclosing array");
                    self.bump();
                    self.phase = Phase::ArrayOpen;
                }
                (Phase::ArrayOpen | Phase::ArrayNext, Some(b']')) => {
                    self.bump();
                    self.phase = Phase::TopLevel;
                }
                (Phase::ArrayNext, Some(b',')) => {
                    self.bump();
                    self.phase = Phase::ArrayElement;
                }
                (Phase::ArrayOpen | Phase::ArrayElement, Some(byte @ (b',' | b']'))) => {
                    self.raw.push(byte);
                    return Err(self.unexpected(byte));
                }
                (Phase::ArrayNext, Some(byte)) => {
                    // The stray item is still read so its text can be reported.
                    let err = self.unexpected(byte);
                    let _ = self.read_value();
                    return Err(err);
                }
                _ => break,
            }
        }

        let value = self.read_value()?;
        if self.phase != Phase::TopLevel {
            self.phase = Phase::ArrayNext;
        }
        let mail = Mail::deserialize(value).map_err(ScanError::Decode)?;
        Ok(Some(mail))
    }

    /// Reads exactly one JSON value, recording its bytes in `raw`.
    fn read_value(&mut self) -> Result<Value, ScanError> {
        let result = {
            let mut de = serde_json::Deserializer::from_reader(Recorder {
                inner: &mut self.reader,
                raw: &mut self.raw,
                offset: &mut self.offset,
            });
            Value::deserialize(&mut de)
        };
        result.map_err(|err| match err.classify() {
            Category::Eof => self.truncated(),
            Category::Io => ScanError::Io(err.into()),
            Category::Syntax | Category::Data => ScanError::Syntax(err),
        })
    }

    fn skip_whitespace(&mut self) -> io::Result<()> {
        loop {
            let buf = fill_buf(&mut self.reader)?;
            if buf.is_empty() {
                return Ok(());
            }
            let count = buf.iter().take_while(|&&b| is_whitespace(b)).count();
            let exhausted = count < buf.len();
            self.reader.consume(count);
            self.offset += count as u64;
            if exhausted {
                return Ok(());
            }
        }
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(fill_buf(&mut self.reader)?.first().copied())
    }

    /// Consumes one byte without recording it.
    fn bump(&mut self) {
        self.reader.consume(1);
        self.offset += 1;
    }

    const fn truncated(&self) -> ScanError {
        ScanError::Truncated {
            offset: self.item_offset,
        }
    }

    fn unexpected(&self, byte: u8) -> ScanError {
        ScanError::UnexpectedToken {
            found: char::from(byte),
            offset: self.offset,
        }
    }
}

/// Byte-at-a-time view of the source for the deserializer that keeps a copy
/// of everything read.
struct Recorder<'a, R> {
    inner: &'a mut R,
    raw: &'a mut Vec<u8>,
    offset: &'a mut u64,
}

impl<R: Read> Read for Recorder<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        self.raw.extend_from_slice(&buf[..count]);
        *self.offset += count as u64;
        Ok(count)
    }
}

fn fill_buf<R: BufRead>(reader: &mut R) -> io::Result<&[u8]> {
    loop {
        match reader.fill_buf() {
            Ok(_) => break,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    reader.fill_buf()
}

const fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}
