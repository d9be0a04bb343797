//! Wire-level encoding primitives for the logfile stream.
//!
//! The on-disk stream is a sequence of *entities* delimited by the entity
//! separator byte, each composed of *records* delimited by the record
//! separator byte. Everything that must not collide with the framing is
//! percent-escaped.
//!
//! # Framing bytes
//!
//! ```text
//! | 0x1E | entity separator, ends an entity                  |
//! | 0x1F | record separator, ends a record within an entity  |
//! | 0x60 | quote mark (backtick) for quoted keys and values  |
//! | 0x3D | assignment between a key and its value            |
//! ```
//!
//! After a record separator, writers may insert a run of *ornament* bytes
//! (spaces, `-`, `=`, `#`, `*`, tab, newline) for readability. Parsers trim
//! any such run.
//!
//! # Escaping
//!
//! A byte that is the escape introducer `%`, a caller-nominated extra, or a
//! control byte other than tab/LF/CR is written as `%HH` with upper-case
//! hex digits. There is no already-encoded detection: encoding the output
//! of `encode` re-encodes the `%` signs.

use crate::error::{Error, Result};

/// Ends an entity.
pub const ENTITY_SEPARATOR: u8 = 0x1E;
/// Ends a record within an entity.
pub const RECORD_SEPARATOR: u8 = 0x1F;
/// Quote mark for quoted keys and values (backtick).
pub const QUOTE: u8 = 0x60;
/// Assignment between key and value.
pub const ASSIGNMENT: u8 = b'=';
/// Escape introducer.
pub const ESCAPE: u8 = b'%';

/// Bytes treated as visual ornament around records.
pub const ORNAMENT: &[u8] = b" -=#*\t\n";

/// Written form of the visual record separator.
pub const VISUAL_RECORD_SEPARATOR: &str = " == ";

/// Indentation for continuation records.
pub const INDENT: &str = "    ";

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

fn needs_escape(b: u8, extras: &[u8]) -> bool {
    b == ESCAPE || extras.contains(&b) || (b < 0x20 && !matches!(b, 0x09 | 0x0A | 0x0D))
}

/// Percent-escapes `text` for placement inside a record.
///
/// Escapes the escape introducer itself, every byte listed in `extras`, and
/// every control byte except tab, LF and CR. All other bytes pass through
/// unchanged.
pub fn encode(text: &str, extras: &[u8]) -> String {
    let mut out = Vec::with_capacity(text.len());
    for &b in text.as_bytes() {
        if needs_escape(b, extras) {
            out.push(ESCAPE);
            out.push(HEX_UPPER[(b >> 4) as usize]);
            out.push(HEX_UPPER[(b & 0x0F) as usize]);
        } else {
            out.push(b);
        }
    }
    // Escaping substitutes ASCII for single bytes; the result can only stop
    // being UTF-8 if an extra split a multi-byte sequence.
    String::from_utf8(out)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Reverses [`encode`].
///
/// Fails with `Format` when a `%` is not followed by two hex digits, when
/// the input ends inside an escape, or when the decoded bytes are not
/// valid UTF-8.
pub fn decode(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESCAPE {
            if i + 2 >= bytes.len() {
                return Err(Error::Format(format!("escape truncated at offset {}", i)));
            }
            let hi = hex_digit(bytes[i + 1], i + 1)?;
            let lo = hex_digit(bytes[i + 2], i + 2)?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out)
        .map_err(|_| Error::Format("decoded bytes are not valid UTF-8".to_string()))
}

fn hex_digit(b: u8, offset: usize) -> Result<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        _ => Err(Error::Format(format!(
            "invalid escape digit 0x{:02X} at offset {}",
            b, offset
        ))),
    }
}

/// Splits `text` into lines.
///
/// CRLF and lone CR are normalised to LF first. Empty input produces one
/// empty element; a trailing LF produces a trailing empty element.
pub fn split_lines(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    normalized.split('\n').map(str::to_owned).collect()
}

/// Strips leading and trailing bytes contained in `set`.
pub fn trim<'a>(bytes: &'a [u8], set: &[u8]) -> &'a [u8] {
    let start = bytes
        .iter()
        .position(|b| !set.contains(b))
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !set.contains(b))
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

/// Result of [`split_records`].
#[derive(Debug, PartialEq, Eq)]
pub struct SplitRecords<'a> {
    /// The separator-terminated records found, in order. When the entity is
    /// complete the last record is the one terminated by the entity
    /// separator.
    pub records: Vec<&'a [u8]>,
    /// Bytes walked past `offset`. Includes the entity separator when the
    /// entity is complete.
    pub consumed: usize,
    /// Whether an entity separator was reached.
    pub entity_complete: bool,
}

/// Walks `bytes` from `offset`, splitting records until an entity
/// separator or the end of input.
///
/// Fails with `InvalidArg` when `offset` lies past the end of `bytes`.
pub fn split_records(bytes: &[u8], offset: usize) -> Result<SplitRecords<'_>> {
    if offset > bytes.len() {
        return Err(Error::InvalidArg(format!(
            "offset {} out of range for {} bytes",
            offset,
            bytes.len()
        )));
    }
    let mut records = Vec::new();
    let mut start = offset;
    for (pos, &b) in bytes.iter().enumerate().skip(offset) {
        match b {
            ENTITY_SEPARATOR => {
                records.push(&bytes[start..pos]);
                return Ok(SplitRecords {
                    records,
                    consumed: pos - offset + 1,
                    entity_complete: true,
                });
            }
            RECORD_SEPARATOR => {
                records.push(&bytes[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    Ok(SplitRecords {
        records,
        consumed: bytes.len() - offset,
        entity_complete: false,
    })
}

/// A parsed key with an optional value. Slices borrow from the input.
#[derive(Debug, PartialEq, Eq)]
pub struct KeyValue<'a> {
    pub key: &'a [u8],
    pub value: Option<&'a [u8]>,
}

/// Parses one record as a key/value pair.
///
/// The input is trimmed of ornament bytes, then interpreted as one of the
/// shapes `k`, `` `k` ``, `k=v`, `` `k`=v ``, ``k=`v` `` or `` `k`=`v` ``.
/// Only zero, two or four quote marks are legal. Between a closing quote
/// and the assignment, and between the assignment and an opening quote,
/// only ornament bytes may appear. Unquoted keys and values are trimmed of
/// ornament on both sides; quoted content is taken verbatim.
pub fn parse_kv(bytes: &[u8]) -> Result<KeyValue<'_>> {
    let t = trim(bytes, ORNAMENT);
    if t.is_empty() {
        // Ornament-only input. A lone assignment among the trimmed bytes is
        // an empty key with an empty value.
        if bytes.contains(&ASSIGNMENT) {
            return Ok(KeyValue {
                key: &[],
                value: Some(&[]),
            });
        }
        return Ok(KeyValue { key: t, value: None });
    }
    let quotes: Vec<usize> = t
        .iter()
        .enumerate()
        .filter(|(_, &b)| b == QUOTE)
        .map(|(i, _)| i)
        .collect();
    match quotes.len() {
        0 => parse_unquoted(t),
        2 => parse_single_quoted(t, quotes[0], quotes[1]),
        4 => parse_double_quoted(t, &quotes),
        n => Err(Error::Format(format!(
            "unbalanced quoting: {} quote marks",
            n
        ))),
    }
}

fn parse_unquoted(t: &[u8]) -> Result<KeyValue<'_>> {
    match t.iter().position(|&b| b == ASSIGNMENT) {
        None => Ok(KeyValue { key: t, value: None }),
        Some(i) => Ok(KeyValue {
            key: trim(&t[..i], ORNAMENT),
            value: Some(trim(&t[i + 1..], ORNAMENT)),
        }),
    }
}

fn parse_single_quoted(t: &[u8], q0: usize, q1: usize) -> Result<KeyValue<'_>> {
    // An assignment inside the quoted span does not separate key from value.
    let assign_before = t[..q0].iter().position(|&b| b == ASSIGNMENT);
    let assign_after = t[q1 + 1..]
        .iter()
        .position(|&b| b == ASSIGNMENT)
        .map(|i| q1 + 1 + i);
    if let Some(i) = assign_before {
        // Unquoted key, quoted value.
        ensure_ornament(&t[i + 1..q0])?;
        ensure_ornament(&t[q1 + 1..])?;
        Ok(KeyValue {
            key: trim(&t[..i], ORNAMENT),
            value: Some(&t[q0 + 1..q1]),
        })
    } else if let Some(i) = assign_after {
        // Quoted key, unquoted value.
        ensure_ornament(&t[..q0])?;
        ensure_ornament(&t[q1 + 1..i])?;
        Ok(KeyValue {
            key: &t[q0 + 1..q1],
            value: Some(trim(&t[i + 1..], ORNAMENT)),
        })
    } else {
        // Bare quoted key.
        ensure_ornament(&t[..q0])?;
        ensure_ornament(&t[q1 + 1..])?;
        Ok(KeyValue {
            key: &t[q0 + 1..q1],
            value: None,
        })
    }
}

fn parse_double_quoted<'a>(t: &'a [u8], q: &[usize]) -> Result<KeyValue<'a>> {
    let (q0, q1, q2, q3) = (q[0], q[1], q[2], q[3]);
    ensure_ornament(&t[..q0])?;
    ensure_ornament(&t[q3 + 1..])?;
    let between = &t[q1 + 1..q2];
    if !between.contains(&ASSIGNMENT) {
        return Err(Error::Format(
            "missing assignment between quoted key and value".to_string(),
        ));
    }
    ensure_ornament(between)?;
    Ok(KeyValue {
        key: &t[q0 + 1..q1],
        value: Some(&t[q2 + 1..q3]),
    })
}

fn ensure_ornament(bytes: &[u8]) -> Result<()> {
    match bytes.iter().find(|b| !ORNAMENT.contains(b)) {
        Some(b) => Err(Error::Format(format!(
            "stray byte 0x{:02X} outside quoting",
            b
        ))),
        None => Ok(()),
    }
}
