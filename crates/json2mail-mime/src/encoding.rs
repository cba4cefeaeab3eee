//! Transfer and header encodings.
//!
//! Base64 (RFC 2045 §6.8), Quoted-Printable (RFC 2045 §6.7) and RFC 2047
//! encoded words for header text.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Maximum encoded line length, excluding CRLF.
const MAX_LINE_LENGTH: usize = 76;

/// Input bytes per RFC 2047 encoded word; keeps each word under 75 chars.
const MAX_WORD_BYTES: usize = 45;

/// Preferred header line length, excluding CRLF (RFC 5322 §2.1.1).
const FOLD_WIDTH: usize = 78;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64, wrapped at 76 columns with CRLF.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }
    out
}

/// Encodes text as Quoted-Printable.
///
/// Line breaks (LF or CRLF) are kept as CRLF hard breaks; long lines get
/// soft breaks so no encoded line exceeds 76 characters. Whitespace at the
/// end of a line is encoded so transports cannot strip it.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        encode_qp_line(line.strip_suffix('\r').unwrap_or(line).as_bytes(), &mut out);
    }
    out
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut width = 0;
    for (i, &byte) in line.iter().enumerate() {
        let last = i + 1 == line.len();
        let literal = matches!(byte, b'!'..=b'<' | b'>'..=b'~')
            || (matches!(byte, b' ' | b'\t') && !last);
        let len = if literal { 1 } else { 3 };

        // A soft break needs one column for its '='.
        let limit = if last {
            MAX_LINE_LENGTH
        } else {
            MAX_LINE_LENGTH - 1
        };
        if width + len > limit {
            out.push_str("=\r\n");
            width = 0;
        }

        if literal {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("={byte:02X}"));
        }
        width += len;
    }
}

/// Encodes header text as RFC 2047 `B` encoded words when it is not plain
/// printable ASCII. Long text is split into several words, folded onto
/// continuation lines, without splitting a UTF-8 character.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    let plain = text.chars().all(|c| c.is_ascii_graphic() || c == ' ') && !text.contains("=?");
    if plain {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if idx + ch.len_utf8() - start > MAX_WORD_BYTES {
            words.push(encoded_word(&text[start..idx]));
            start = idx;
        }
    }
    words.push(encoded_word(&text[start..]));
    words.join("\r\n ")
}

fn encoded_word(chunk: &str) -> String {
    format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes()))
}

/// Joins header list items with `, `, moving an item to a continuation line
/// when it (and a trailing comma) would push the line past 78 characters.
///
/// `offset` is the width already taken on the first line, `Name: ` included.
#[must_use]
pub fn fold_list<'a>(offset: usize, items: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    let mut width = offset;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            if width + 3 + first_line_len(item) > FOLD_WIDTH {
                out.push_str(",\r\n ");
                width = 1;
            } else {
                out.push_str(", ");
                width += 2;
            }
        }
        out.push_str(item);
        width = last_line_width(item, width);
    }
    out
}

/// Folds unstructured header text at spaces so lines stay near 78
/// characters. A single word longer than that is left whole.
#[must_use]
pub fn fold_text(offset: usize, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut width = offset;
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            if !word.is_empty() && width + 1 + word.len() > FOLD_WIDTH {
                out.push_str("\r\n");
                width = 0;
            }
            out.push(' ');
            width += 1;
        }
        out.push_str(word);
        width += word.len();
    }
    out
}

fn first_line_len(item: &str) -> usize {
    item.find("\r\n").unwrap_or(item.len())
}

fn last_line_width(item: &str, width: usize) -> usize {
    match item.rfind("\r\n") {
        Some(pos) => item.len() - pos - 2,
        None => width + item.len(),
    }
}
