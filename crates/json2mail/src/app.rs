//! Process flow: open the source, connect, dispatch, close.

use std::io::Write;
use std::process::ExitCode;

use tracing::info;

use crate::dispatch::{DispatchSummary, dispatch};
use crate::event::EventLog;
use crate::options::Options;
use crate::scanner::MailScanner;
use crate::sender::{DryRunSender, Sender, SmtpSender};

/// How a run ended, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The loop ran; individual sends or a decode error may still have failed.
    Completed(DispatchSummary),
    /// The source could not be opened.
    SourceUnavailable,
    /// The SMTP session could not be established.
    ConnectFailed,
}

impl Status {
    /// Process exit code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Completed(_) => 0,
            Self::ConnectFailed => 1,
            Self::SourceUnavailable => 2,
        }
    }
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        Self::from(status.code())
    }
}

/// Runs json2mail with validated options, writing events to `log`.
pub async fn run<W: Write>(options: &Options, log: &mut EventLog<W>) -> Status {
    let reader = match options.source.open() {
        Ok(reader) => reader,
        Err(err) => {
            log.error(
                &format!("failed to open source file: {err}"),
                &options.source.to_string(),
            );
            return Status::SourceUnavailable;
        }
    };
    let mut scanner = MailScanner::new(reader);

    if options.dry_run {
        info!("dry run: no server connection");
        let sender = DryRunSender::new(options.default_from());
        return Status::Completed(drive(&mut scanner, sender, log, options).await);
    }

    match SmtpSender::connect(options).await {
        Ok(sender) => Status::Completed(drive(&mut scanner, sender, log, options).await),
        Err(err) => {
            log.error(
                &format!("failed to connect server: {err}"),
                &options.server.to_string(),
            );
            Status::ConnectFailed
        }
    }
}

async fn drive<R, S, W>(
    scanner: &mut MailScanner<R>,
    mut sender: S,
    log: &mut EventLog<W>,
    options: &Options,
) -> DispatchSummary
where
    R: std::io::BufRead,
    S: Sender,
    W: Write,
{
    let summary = dispatch(scanner, &mut sender, log, options.interval).await;
    sender.close().await;
    summary
}
