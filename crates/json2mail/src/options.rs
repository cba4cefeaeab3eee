//! Command line and environment configuration.

use std::fmt;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::source::Source;

/// Port used when the server address has none, or an unusable one.
pub const DEFAULT_PORT: u16 = 587;

/// Raw command line arguments.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "json2mail", version, about = "Send emails described as JSON through an SMTP server", long_about = None)]
pub struct Args {
    /// SMTP server address (host:port)
    #[arg(long, env = "JSON2MAIL_SERVER")]
    pub server: Option<String>,

    /// Username for login to the SMTP server
    #[arg(long, env = "JSON2MAIL_USERNAME")]
    pub username: Option<String>,

    /// Password for login to the SMTP server
    #[arg(long, env = "JSON2MAIL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// JSON file with the mails to send (file path, or - for stdin)
    #[arg(long, default_value = "-")]
    pub source: String,

    /// Interval between two sends, e.g. 500ms, 2s, 1m30s (0 means none)
    #[arg(long, default_value = "0", value_parser = parse_interval)]
    pub interval: Duration,

    /// Allow sending without encryption when STARTTLS is unavailable (NOT recommended)
    #[arg(long)]
    pub allow_insecure: bool,

    /// Read and compose the mails without connecting to the server
    #[arg(long)]
    pub dry_run: bool,
}

/// Validated, immutable configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// SMTP server.
    pub server: ServerAddress,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Where records are read from.
    pub source: Source,
    /// Minimum delay between two send attempts.
    pub interval: Duration,
    /// Continue without TLS when the server does not offer STARTTLS.
    pub allow_insecure: bool,
    /// Compose only, never connect.
    pub dry_run: bool,
}

impl Options {
    /// Sender used for records without `from`.
    #[must_use]
    pub fn default_from(&self) -> String {
        default_from(&self.username, &self.server.host)
    }
}

/// Required settings that were not provided.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", report(.missing))]
pub struct ConfigError {
    missing: Vec<&'static str>,
}

impl ConfigError {
    /// Names of the missing flags.
    #[must_use]
    pub fn missing(&self) -> &[&'static str] {
        &self.missing
    }
}

fn report(missing: &[&str]) -> String {
    let mut text = String::from("error:\n");
    for flag in missing {
        text.push_str(&format!("  --{flag} is required.\n"));
    }
    text.push_str("\nPlease see --help for more detail.");
    text
}

impl Args {
    /// Checks that every required setting is present.
    ///
    /// Empty values count as missing.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every missing setting at once.
    pub fn validate(self) -> Result<Options, ConfigError> {
        let server = non_empty(self.server);
        let username = non_empty(self.username);
        let password = non_empty(self.password);

        let missing: Vec<&'static str> = [
            ("server", server.is_none()),
            ("username", username.is_none()),
            ("password", password.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        match (server, username, password) {
            (Some(server), Some(username), Some(password)) => Ok(Options {
                server: ServerAddress::parse(&server),
                username,
                password,
                source: Source::parse(&self.source),
                interval: self.interval,
                allow_insecure: self.allow_insecure,
                dry_run: self.dry_run,
            }),
            _ => Err(ConfigError { missing }),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// SMTP server host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    /// Host name or IP address, without brackets.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerAddress {
    /// Parses `host:port`, `[v6]:port` or a bare host.
    ///
    /// A missing port, or one outside 1..=65534, becomes [`DEFAULT_PORT`].
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let Some((host, port)) = split_host_port(text) else {
            let host = text
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(text);
            return Self {
                host: host.to_string(),
                port: DEFAULT_PORT,
            };
        };

        let port = port
            .parse::<u16>()
            .ok()
            .filter(|p| (1..u16::MAX).contains(p))
            .unwrap_or(DEFAULT_PORT);
        Self {
            host: host.to_string(),
            port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn split_host_port(text: &str) -> Option<(&str, &str)> {
    if let Some(rest) = text.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        return Some((host, after.strip_prefix(':')?));
    }
    let (host, port) = text.rsplit_once(':')?;
    // A second colon means an unbracketed IPv6 address.
    (!host.contains(':')).then_some((host, port))
}

/// The username when it is an address, otherwise `username@host`.
#[must_use]
pub fn default_from(username: &str, host: &str) -> String {
    if username.contains('@') {
        username.to_string()
    } else {
        format!("{username}@{host}")
    }
}

/// Parses a duration such as `0`, `250ms`, `1.5s` or `1h2m3s`.
///
/// Units: `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`.
///
/// # Errors
///
/// Returns a message for negative values, missing or unknown units and
/// values that overflow.
pub fn parse_interval(text: &str) -> Result<Duration, String> {
    let trimmed = text.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }
    if trimmed.starts_with('-') {
        return Err(format!("negative interval {text:?}"));
    }
    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if rest.is_empty() {
        return Err(format!("invalid interval {text:?}"));
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail.find(is_number).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        rest = tail;

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            "" => return Err(format!("missing unit in interval {text:?}")),
            other => return Err(format!("unknown unit {other:?} in interval {text:?}")),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(format!("invalid interval {text:?}"));
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| format!("invalid interval {text:?}"))?
        };

        let mut nanos = whole
            .checked_mul(scale)
            .ok_or_else(|| format!("interval {text:?} is too large"))?;
        let mut digit_scale = scale;
        for digit in fraction.bytes() {
            digit_scale /= 10;
            if digit_scale == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * digit_scale;
        }
        total = total
            .checked_add(nanos)
            .ok_or_else(|| format!("interval {text:?} is too large"))?;
    }

    u64::try_from(total)
        .map(Duration::from_nanos)
        .map_err(|_| format!("interval {text:?} is too large"))
}
