//! The scan, send, log and pace loop.

use std::io::{BufRead, Write};
use std::time::Duration;

use tracing::{info, warn};

use crate::event::EventLog;
use crate::scanner::MailScanner;
use crate::sender::Sender;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every record in the stream was attempted.
    Exhausted,
    /// A record could not be decoded; later records were not attempted.
    DecodeFailed,
}

/// Counters for one run of [`dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Records delivered.
    pub sent: usize,
    /// Records whose delivery failed.
    pub failed: usize,
    /// Why the loop stopped.
    pub outcome: Outcome,
}

/// Sends every record of `scanner` through `sender`.
///
/// Each delivery is logged as a mail event, each failure as an error event
/// carrying the record; a failed delivery never stops the loop. A decode
/// error is logged once with the offending raw text and ends the loop.
///
/// Consecutive send attempts are at least `interval` apart. No delay is
/// added before the first attempt or after the last one.
pub async fn dispatch<R, S, W>(
    scanner: &mut MailScanner<R>,
    sender: &mut S,
    log: &mut EventLog<W>,
    interval: Duration,
) -> DispatchSummary
where
    R: BufRead,
    S: Sender,
    W: Write,
{
    let mut sent = 0;
    let mut failed = 0;

    while let Some(mail) = scanner.next_record() {
        if sent + failed > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        match sender.send(mail).await {
            Ok(()) => {
                sent += 1;
                log.mail(mail);
            }
            Err(err) => {
                failed += 1;
                warn!(to = %mail.to, error = %err, "failed to send");
                log.error(&format!("failed to send: {err}"), mail);
            }
        }
    }

    let outcome = match scanner.error() {
        None => Outcome::Exhausted,
        Some(err) => {
            warn!(offset = scanner.item_offset(), error = %err, "stopped on undecodable input");
            log.error(&err.to_string(), &*scanner.current_raw_text());
            Outcome::DecodeFailed
        }
    };

    info!(sent, failed, ?outcome, "dispatch finished");
    DispatchSummary {
        sent,
        failed,
        outcome,
    }
}
