//! Structured outcome log: one JSON object per line.
//!
//! ```text
//! {"timestamp":"2024-05-01T10:00:00+02:00","mail":{"to":["a@example.com"],"body":"hi"}}
//! {"timestamp":"2024-05-01T10:00:01+02:00","error":"failed to send: ...","input_data":{...}}
//! ```

use std::io::{self, Write};

use chrono::{Local, SecondsFormat};
use serde::Serialize;
use tracing::warn;

use crate::mail::Mail;

#[derive(Serialize)]
struct ErrorEvent<'a, T: ?Sized> {
    timestamp: String,
    error: &'a str,
    input_data: &'a T,
}

#[derive(Serialize)]
struct MailEvent<'a> {
    timestamp: String,
    mail: &'a Mail,
}

/// Append-only event sink.
///
/// Logging never fails from the caller's point of view: write errors are
/// reported through `tracing` and dropped.
#[derive(Debug)]
pub struct EventLog<W> {
    out: W,
}

impl<W: Write> EventLog<W> {
    /// Creates a log writing to `out`.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Records an error together with the input it concerns.
    pub fn error<T: Serialize + ?Sized>(&mut self, message: &str, input: &T) {
        self.write(&ErrorEvent {
            timestamp: timestamp(),
            error: message,
            input_data: input,
        });
    }

    /// Records a mail that was sent.
    pub fn mail(&mut self, mail: &Mail) {
        self.write(&MailEvent {
            timestamp: timestamp(),
            mail,
        });
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write<T: Serialize>(&mut self, event: &T) {
        if let Err(err) = self.try_write(event) {
            warn!(error = %err, "failed to write log event");
        }
    }

    fn try_write<T: Serialize>(&mut self, event: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
