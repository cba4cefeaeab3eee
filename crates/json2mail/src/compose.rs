//! Turns a mail record into an SMTP envelope and message bytes.

use json2mail_mime::encoding::{encode_rfc2047, fold_list};
use json2mail_mime::{Attachment, Message, MessageBuilder};
use json2mail_smtp::{Envelope, Mailbox};

use crate::error::SendError;
use crate::mail::{AddressList, Mail};

/// A record ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    /// Reverse path and every recipient, Bcc included.
    pub envelope: Envelope,
    /// The message; `Bcc` is not part of its wire form.
    pub message: Message,
}

/// Builds the transport copy of `mail`.
///
/// The record itself is left untouched; `default_from` only fills the
/// envelope and `From` header when the record has no sender.
///
/// # Errors
///
/// Returns an error if `default_from` is needed but is not a valid mailbox,
/// or an attachment cannot be read.
pub fn compose(mail: &Mail, default_from: &str) -> Result<Composed, SendError> {
    let from = match &mail.from {
        Some(from) => from.clone(),
        None => Mailbox::parse(default_from).map_err(|source| SendError::Sender {
            address: default_from.to_string(),
            source,
        })?,
    };

    let mut builder = MessageBuilder::new()
        .from(header_mailbox(&from))
        .to(header_list("To", &mail.to));
    if let Some(cc) = mail.cc.as_ref().filter(|cc| !cc.is_empty()) {
        builder = builder.cc(header_list("Cc", cc));
    }
    if let Some(bcc) = mail.bcc.as_ref().filter(|bcc| !bcc.is_empty()) {
        builder = builder.bcc(header_list("Bcc", bcc));
    }
    if let Some(subject) = mail.subject.as_deref().filter(|s| !s.is_empty()) {
        builder = builder.subject(subject);
    }
    builder = builder.text_body(mail.body.as_str());

    for path in &mail.attachments {
        builder = builder.attach(Attachment::from_file(path)?);
    }

    let recipients = mail.recipients().map(|m| m.address.clone()).collect();
    Ok(Composed {
        envelope: Envelope::new(from.address, recipients)?,
        message: builder.build()?,
    })
}

/// Header form of a mailbox, with a non-ASCII display name encoded.
fn header_mailbox(mailbox: &Mailbox) -> String {
    match &mailbox.name {
        Some(name) if !name.is_ascii() => {
            format!("{} <{}>", encode_rfc2047(name), mailbox.address)
        }
        _ => mailbox.to_string(),
    }
}

/// Mailbox list for the `name` header, folded between mailboxes.
fn header_list(name: &str, list: &AddressList) -> String {
    let mailboxes: Vec<String> = list.iter().map(header_mailbox).collect();
    fold_list(name.len() + 2, mailboxes.iter().map(String::as_str))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn mail(json: &str) -> Mail {
        serde_json::from_str(json).unwrap()
    }

    fn wire(composed: &Composed) -> String {
        String::from_utf8(composed.message.to_bytes()).unwrap()
    }

    fn header_names(composed: &Composed) -> Vec<String> {
        wire(composed)
            .split("\r\n\r\n")
            .next()
            .unwrap()
            .lines()
            .filter(|line| !line.starts_with(' '))
            .map(|line| line.split(':').next().unwrap().to_string())
            .collect()
    }

    #[test]
    fn default_sender_and_header_order() {
        let record = mail(r#"{"to": "a@example.com", "subject": "Hi", "body": "Hello"}"#);
        let composed = compose(&record, "bot@example.com").unwrap();

        assert_eq!(composed.envelope.from().as_str(), "bot@example.com");
        assert_eq!(
            header_names(&composed),
            vec![
                "From",
                "To",
                "Subject",
                "Date",
                "MIME-Version",
                "Content-Type",
                "Content-Transfer-Encoding"
            ]
        );
        assert!(wire(&composed).ends_with("\r\n\r\nHello\r\n"));
        assert!(record.from.is_none());
    }

    #[test]
    fn record_sender_wins() {
        let record = mail(r#"{"to": "a@example.com", "from": "Me <me@example.org>"}"#);
        let composed = compose(&record, "not a mailbox").unwrap();
        assert_eq!(composed.envelope.from().as_str(), "me@example.org");
        assert!(wire(&composed).starts_with("From: Me <me@example.org>\r\n"));
    }

    #[test]
    fn invalid_default_sender() {
        let record = mail(r#"{"to": "a@example.com"}"#);
        let err = compose(&record, "no at sign").unwrap_err();
        assert!(matches!(err, SendError::Sender { .. }));
    }

    #[test]
    fn absent_or_empty_cc_and_subject_are_suppressed() {
        for json in [
            r#"{"to": "a@example.com"}"#,
            r#"{"to": "a@example.com", "cc": [], "bcc": [], "subject": ""}"#,
        ] {
            let composed = compose(&mail(json), "bot@example.com").unwrap();
            let names = header_names(&composed);
            assert!(!names.iter().any(|n| n == "Cc" || n == "Bcc" || n == "Subject"), "{json}");
        }
    }

    #[test]
    fn all_cc_rendered_and_bcc_only_in_envelope() {
        let record = mail(
            r#"{"to": "a@example.com", "cc": ["b@example.com", "c@example.com"], "bcc": "hidden@example.com"}"#,
        );
        let composed = compose(&record, "bot@example.com").unwrap();
        let text = wire(&composed);

        assert!(text.contains("\r\nCc: b@example.com, c@example.com\r\n"));
        assert!(!text.contains("hidden@example.com"));

        let rcpt: Vec<&str> = composed
            .envelope
            .recipients()
            .iter()
            .map(|a| a.as_str())
            .collect();
        assert_eq!(
            rcpt,
            vec!["a@example.com", "b@example.com", "c@example.com", "hidden@example.com"]
        );
    }

    #[test]
    fn non_ascii_names_are_encoded() {
        let record = mail(r#"{"to": "Zoë <zoe@example.com>", "subject": "Café"}"#);
        let text = wire(&compose(&record, "bot@example.com").unwrap());
        assert!(text.contains("To: =?utf-8?B?Wm/Dqw==?= <zoe@example.com>\r\n"));
        assert!(text.contains("Subject: =?utf-8?B?Q2Fmw6k=?=\r\n"));
        assert!(text.is_ascii());
    }

    #[test]
    fn long_recipient_lists_are_folded() {
        let to: Vec<String> = (0..100).map(|i| format!("\"user{i}@example.com\"")).collect();
        let subject = "update ".repeat(40);
        let record = mail(&format!(
            r#"{{"to": [{}], "subject": "{}"}}"#,
            to.join(","),
            subject.trim_end()
        ));
        let composed = compose(&record, "bot@example.com").unwrap();
        let text = wire(&composed);
        let head = text.split("\r\n\r\n").next().unwrap();

        assert!(head.lines().all(|line| line.len() <= 78), "{head}");
        assert!(head.contains("To: user0@example.com, user1@example.com"));
        assert!(head.contains("user99@example.com\r\n"));
        assert_eq!(composed.envelope.recipients().len(), 100);
    }

    #[test]
    fn attachments_are_read() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"a,b\n1,2\n").unwrap();

        let record = Mail {
            attachments: vec![file.path().to_path_buf()],
            ..mail(r#"{"to": "a@example.com", "body": "report"}"#)
        };
        let text = wire(&compose(&record, "bot@example.com").unwrap());
        assert!(text.contains("Content-Type: multipart/mixed; boundary="));
        assert!(text.contains("Content-Type: text/csv; name="));
        assert!(text.contains("YSxiCjEsMgo="));
    }

    #[test]
    fn missing_attachment_fails_the_record() {
        let record = mail(r#"{"to": "a@example.com", "attachments": ["/nonexistent/json2mail.txt"]}"#);
        let err = compose(&record, "bot@example.com").unwrap_err();
        assert!(matches!(err, SendError::Message(_)));
        assert!(err.to_string().contains("/nonexistent/json2mail.txt"));
    }
}
