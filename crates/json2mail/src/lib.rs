//! # json2mail
//!
//! Sends a stream of JSON mail records through an SMTP server, one message
//! at a time, and reports every outcome as a JSON line.
//!
//! ```text
//! source ──► MailScanner ──► dispatch ──► Sender (SMTP / dry run)
//!                               │
//!                               └──► EventLog (stdout)
//! ```
//!
//! Records are read lazily, so the input may be an endless pipe. A record
//! that fails to send is logged and skipped; a record that fails to decode
//! ends the run.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod compose;
pub mod dispatch;
mod error;
pub mod event;
pub mod mail;
pub mod options;
pub mod scanner;
pub mod sender;
pub mod source;

pub use app::{Status, run};
pub use dispatch::{DispatchSummary, Outcome, dispatch};
pub use error::{ConnectError, SendError};
pub use event::EventLog;
pub use mail::{AddressList, Mail};
pub use options::{Args, ConfigError, Options, ServerAddress};
pub use scanner::{MailScanner, ScanError};
pub use sender::{DryRunSender, Sender, SmtpSender};
pub use source::Source;
