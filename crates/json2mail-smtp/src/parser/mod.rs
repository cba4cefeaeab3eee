//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses the lines of one SMTP reply.
///
/// Replies are single-line (`250 OK`) or multi-line, where every line but
/// the last uses `-` after the code (`250-First`, `250 Last`). All lines
/// must carry the same code.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the reply is empty, a line is malformed,
/// or the lines disagree on the code.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("empty reply".into()));
    };
    let code = parse_code(first)?;

    let mut text = Vec::with_capacity(lines.len());
    for line in lines {
        if parse_code(line)? != code {
            return Err(Error::Protocol(format!(
                "reply code changed mid-reply: {line}"
            )));
        }
        match line.as_bytes().get(3) {
            None => text.push(String::new()),
            Some(b' ' | b'-') => text.push(line[4..].to_string()),
            Some(_) => return Err(Error::Protocol(format!("malformed reply line: {line}"))),
        }
    }

    Ok(Reply::new(ReplyCode::new(code), text))
}

/// Returns true if `line` ends a (possibly multi-line) reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() == 3 || (line.len() >= 4 && line.as_bytes()[3] == b' ')
}

fn parse_code(line: &str) -> Result<u16> {
    line.get(..3)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("invalid reply code: {line}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn single_line() {
        let reply = parse_reply(&lines(&["250 2.0.0 Ok: queued"])).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.lines, vec!["2.0.0 Ok: queued"]);
    }

    #[test]
    fn multi_line_ehlo() {
        let reply =
            parse_reply(&lines(&["250-mx.example.com", "250-PIPELINING", "250 STARTTLS"]))
                .unwrap();
        assert_eq!(reply.lines, vec!["mx.example.com", "PIPELINING", "STARTTLS"]);
    }

    #[test]
    fn bare_code() {
        let reply = parse_reply(&lines(&["354"])).unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.lines, vec![String::new()]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&lines(&["25"])).is_err());
        assert!(parse_reply(&lines(&["ABC OK"])).is_err());
        assert!(parse_reply(&lines(&["250xOK"])).is_err());
    }

    #[test]
    fn rejects_mixed_codes() {
        assert!(parse_reply(&lines(&["250-one", "550 two"])).is_err());
    }

    #[test]
    fn last_line_detection() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("221"));
        assert!(!is_last_reply_line("250-PIPELINING"));
    }
}
