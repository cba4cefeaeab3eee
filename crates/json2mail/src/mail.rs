//! The mail record decoded from the input stream.

use std::fmt;
use std::path::PathBuf;

use json2mail_smtp::Mailbox;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

/// One message to send, as described by the input.
///
/// A record is never modified after decoding; defaults that only matter on
/// the wire (such as the sender) are applied to a derived copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    /// Primary recipients; at least one.
    #[serde(deserialize_with = "required_list")]
    pub to: AddressList,
    /// Carbon-copy recipients. `None` suppresses the header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<AddressList>,
    /// Blind carbon-copy recipients, delivered through the envelope only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc: Option<AddressList>,
    /// Sender; the configured default is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Mailbox>,
    /// Subject line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Plain-text body.
    #[serde(default)]
    pub body: String,
    /// Files attached to the message, read at send time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<PathBuf>,
}

impl Mail {
    /// Every envelope recipient: `to`, then `cc`, then `bcc`.
    pub fn recipients(&self) -> impl Iterator<Item = &Mailbox> {
        self.to
            .iter()
            .chain(self.cc.iter().flat_map(AddressList::iter))
            .chain(self.bcc.iter().flat_map(AddressList::iter))
    }
}

/// Ordered list of mailboxes.
///
/// Decodes from a JSON string or an array of strings; every string may hold
/// a comma-separated list. Encodes as an array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AddressList(Vec<Mailbox>);

impl AddressList {
    /// Returns true if the list holds no mailbox.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of mailboxes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the mailboxes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Mailbox> {
        self.0.iter()
    }

    /// The mailboxes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Mailbox] {
        &self.0
    }
}

impl From<Vec<Mailbox>> for AddressList {
    fn from(mailboxes: Vec<Mailbox>) -> Self {
        Self(mailboxes)
    }
}

impl FromIterator<Mailbox> for AddressList {
    fn from_iter<I: IntoIterator<Item = Mailbox>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a AddressList {
    type Item = &'a Mailbox;
    type IntoIter = std::slice::Iter<'a, Mailbox>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for AddressList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mailbox) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{mailbox}")?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for AddressList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AddressListVisitor)
    }
}

struct AddressListVisitor;

impl<'de> Visitor<'de> for AddressListVisitor {
    type Value = AddressList;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an address string or an array of address strings")
    }

    fn visit_str<E: de::Error>(self, text: &str) -> Result<Self::Value, E> {
        Mailbox::parse_list(text).map(AddressList).map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut mailboxes = Vec::new();
        while let Some(text) = seq.next_element::<String>()? {
            mailboxes.extend(Mailbox::parse_list(&text).map_err(de::Error::custom)?);
        }
        Ok(AddressList(mailboxes))
    }
}

fn required_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AddressList, D::Error> {
    let list = AddressList::deserialize(deserializer)?;
    if list.is_empty() {
        return Err(de::Error::custom("`to` must contain at least one address"));
    }
    Ok(list)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Result<Mail, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[test]
    fn minimal_record() {
        let mail = decode(r#"{"to": "alice@example.com"}"#).unwrap();
        assert_eq!(mail.to.len(), 1);
        assert_eq!(mail.to.as_slice()[0].address.as_str(), "alice@example.com");
        assert!(mail.cc.is_none());
        assert!(mail.from.is_none());
        assert_eq!(mail.body, "");
        assert!(mail.attachments.is_empty());
    }

    #[test]
    fn lists_from_strings_and_arrays() {
        let mail = decode(
            r#"{
                "to": ["alice@example.com", "Bob <bob@example.com>, carol@example.com"],
                "cc": "\"Doe, Jane\" <jane@example.com>",
                "bcc": [],
                "from": "Sender <sender@example.com>",
                "subject": "Hello",
                "body": "Hi!",
                "attachments": ["/tmp/a.pdf"],
                "unknown": 42
            }"#,
        )
        .unwrap();

        let to: Vec<String> = mail.to.iter().map(ToString::to_string).collect();
        assert_eq!(
            to,
            vec!["alice@example.com", "Bob <bob@example.com>", "carol@example.com"]
        );
        let cc = mail.cc.as_ref().unwrap();
        assert_eq!(cc.as_slice()[0].name.as_deref(), Some("Doe, Jane"));
        assert!(mail.bcc.as_ref().unwrap().is_empty());
        assert_eq!(mail.from.unwrap().name.as_deref(), Some("Sender"));
        assert_eq!(mail.attachments, vec![PathBuf::from("/tmp/a.pdf")]);
    }

    #[test]
    fn null_equals_absent() {
        let mail = decode(r#"{"to": "a@example.com", "cc": null, "from": null, "subject": null}"#)
            .unwrap();
        assert!(mail.cc.is_none());
        assert!(mail.from.is_none());
        assert!(mail.subject.is_none());
    }

    #[test]
    fn to_is_required_and_non_empty() {
        let err = decode(r#"{"subject": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("missing field `to`"));

        let err = decode(r#"{"to": []}"#).unwrap_err();
        assert!(err.to_string().contains("at least one address"));
    }

    #[test]
    fn invalid_addresses_fail_decoding() {
        assert!(decode(r#"{"to": "not-an-address"}"#).is_err());
        assert!(decode(r#"{"to": "a@b@example.com"}"#).is_err());
        assert!(decode(r#"{"to": 42}"#).is_err());
        assert!(decode(r#"{"to": [42]}"#).is_err());
    }

    #[test]
    fn recipients_are_ordered() {
        let mail = decode(
            r#"{"to": "a@example.com", "cc": "b@example.com", "bcc": "c@example.com, d@example.com"}"#,
        )
        .unwrap();
        let all: Vec<&str> = mail.recipients().map(|m| m.address.as_str()).collect();
        assert_eq!(
            all,
            vec!["a@example.com", "b@example.com", "c@example.com", "d@example.com"]
        );
    }

    #[test]
    fn serializes_as_decoded() {
        let mail = decode(r#"{"to": "Alice <alice@example.com>", "body": "hi"}"#).unwrap();
        let json = serde_json::to_value(&mail).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"to": ["Alice <alice@example.com>"], "body": "hi"})
        );
    }
}
