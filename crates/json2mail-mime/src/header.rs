//! Ordered header block.

use crate::error::{Error, Result};
use std::fmt;

/// Collection of message headers, kept in insertion order.
///
/// Lookups are case-insensitive; names are written as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header value: the first existing entry is replaced in place
    /// and later duplicates are dropped; otherwise the header is appended.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(pos) => {
                self.entries[pos].1 = value;
                let mut index = 0;
                self.entries.retain(|(n, _)| {
                    let keep = index <= pos || !n.eq_ignore_ascii_case(&name);
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|pos| self.entries[pos].1.as_str())
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns an iterator over all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Checks that no value contains a line break other than folding
    /// (CRLF followed by a space or tab).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] naming the first offending header.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in &self.entries {
            if name.is_empty() || name.contains([':', ' ', '\r', '\n']) || !is_folded_only(value) {
                return Err(Error::InvalidHeader(name.clone()));
            }
        }
        Ok(())
    }

    /// Writes the header block, skipping any header named in `skip`.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>, skip: &[&str]) {
        for (name, value) in &self.entries {
            if skip.iter().any(|s| s.eq_ignore_ascii_case(name)) {
                continue;
            }
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

fn is_folded_only(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.iter().enumerate().all(|(i, &b)| match b {
        b'\r' => bytes.get(i + 1) == Some(&b'\n'),
        b'\n' => i > 0 && bytes[i - 1] == b'\r' && matches!(bytes.get(i + 1), Some(b' ' | b'\t')),
        _ => true,
    })
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn order_is_preserved() {
        let mut headers = Headers::new();
        headers.add("From", "a@example.com");
        headers.add("To", "b@example.com");
        headers.add("Subject", "Hi");
        assert_eq!(
            headers.to_string(),
            "From: a@example.com\r\nTo: b@example.com\r\nSubject: Hi\r\n"
        );
    }

    #[test]
    fn set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("Subject", "x");
        headers.add("to", "bob@example.com");

        headers.set("To", "carol@example.com");
        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["To", "Subject"]);
        assert_eq!(headers.get("To"), Some("carol@example.com"));
    }

    #[test]
    fn remove_drops_all_values() {
        let mut headers = Headers::new();
        headers.add("Bcc", "x@example.com");
        headers.add("bcc", "y@example.com");
        headers.remove("BCC");
        assert!(!headers.contains("Bcc"));
    }

    #[test]
    fn write_to_skips_names() {
        let mut headers = Headers::new();
        headers.add("To", "a@example.com");
        headers.add("Bcc", "hidden@example.com");
        let mut out = Vec::new();
        headers.write_to(&mut out, &["bcc"]);
        assert_eq!(out, b"To: a@example.com\r\n");
    }

    #[test]
    fn validate_rejects_injection() {
        let mut headers = Headers::new();
        headers.add("Subject", "=?utf-8?B?QQ==?=\r\n =?utf-8?B?Qg==?=");
        assert!(headers.validate().is_ok());

        headers.add("X-Evil", "hi\r\nBcc: victim@example.com");
        assert!(matches!(headers.validate(), Err(Error::InvalidHeader(name)) if name == "X-Evil"));

        let mut bad_name = Headers::new();
        bad_name.add("Bad Name", "x");
        assert!(bad_name.validate().is_err());
    }
}
