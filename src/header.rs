//! The header entity.
//!
//! Every logfile begins with exactly one header. On the wire it looks
//! like this (separators shown as `<RS>`/`<ES>`):
//!
//! ```text
//! SLF.1<RS> == app=`MyApp`<RS> == start-up=`2024-03-05T07:08:09.1230000+01:00`<RS> == seq-no=3
//! <RS>    `host`=`db1`<ES>
//! ```
//!
//! The first record is the identity literal, followed by the three
//! mandatory records in fixed order and any number of optional key/value
//! records, one per line. Parsing is incremental: callers feed whatever
//! bytes they have and are told when more are needed.

use chrono::FixedOffset;

use crate::encoding::{
    self, ENTITY_SEPARATOR, INDENT, ORNAMENT, QUOTE, RECORD_SEPARATOR, VISUAL_RECORD_SEPARATOR,
};
use crate::error::{Error, Result};
use crate::time::{self, LogTimestamp};

/// Identity literal of a header entity.
pub const HEADER_IDENTITY: &str = "SLF.1";

/// A parsed or to-be-written header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Application that produced the file.
    pub app_name: String,
    /// When the producing process started.
    pub start_up: LogTimestamp,
    /// File sequence number, strictly positive.
    pub seq_no: u64,
    /// Optional key/value records in insertion order.
    pub misc: Vec<(String, String)>,
}

/// Outcome of [`Header::identify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identification {
    /// More bytes are required before the question can be answered.
    pub need_more: bool,
    /// The first record matches the header identity.
    pub compatible: bool,
}

/// Outcome of [`Header::parse`].
#[derive(Debug)]
pub struct HeaderParse {
    /// The entity is not complete yet; feed more bytes and retry.
    pub need_more: bool,
    /// Bytes consumed when a header was produced.
    pub consumed: usize,
    pub header: Option<Header>,
}

impl Header {
    pub fn new(app_name: &str, start_up: LogTimestamp, seq_no: u64) -> Self {
        Self {
            app_name: app_name.to_owned(),
            start_up,
            seq_no,
            misc: Vec::new(),
        }
    }

    pub fn with_misc(mut self, key: &str, value: &str) -> Self {
        self.misc.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Serialises the header as one entity, terminated by the entity
    /// separator.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER_IDENTITY);
        push_mandatory(
            &mut out,
            &format!("app=`{}`", encoding::encode(&self.app_name, &[QUOTE])),
        );
        push_mandatory(
            &mut out,
            &format!("start-up=`{}`", time::to_iso8601(&self.start_up)),
        );
        push_mandatory(&mut out, &format!("seq-no={}", self.seq_no));
        for (key, value) in &self.misc {
            out.push('\n');
            out.push(RECORD_SEPARATOR as char);
            out.push_str(INDENT);
            out.push_str(&format!(
                "`{}`=`{}`",
                encoding::encode(key, &[QUOTE]),
                encoding::encode(value, &[QUOTE])
            ));
        }
        out.push(ENTITY_SEPARATOR as char);
        out
    }

    /// Cheap probe: do these bytes begin a header entity?
    ///
    /// Asks for more bytes while fewer than the identity literal are
    /// available; otherwise compares the first record against the literal.
    pub fn identify(bytes: &[u8]) -> Identification {
        let identity = HEADER_IDENTITY.as_bytes();
        if bytes.len() < identity.len() {
            return Identification {
                need_more: true,
                compatible: false,
            };
        }
        let first_record = match bytes
            .iter()
            .position(|&b| b == RECORD_SEPARATOR || b == ENTITY_SEPARATOR)
        {
            Some(p) => &bytes[..p],
            None => &bytes[..identity.len()],
        };
        Identification {
            need_more: false,
            compatible: first_record == identity,
        }
    }

    /// Parses one header entity from the start of `bytes`.
    ///
    /// An incomplete entity yields `need_more` instead of an error. A
    /// complete entity that is not a header fails with `Unsupported`; a
    /// header whose records are malformed fails with `Format`. The
    /// `start-up` record is converted to UTC, interpreting an unspecified
    /// zone in `tz` (the system-local zone when `None`).
    pub fn parse(bytes: &[u8], tz: Option<FixedOffset>) -> Result<HeaderParse> {
        let split = encoding::split_records(bytes, 0)?;
        if !split.entity_complete {
            return Ok(HeaderParse {
                need_more: true,
                consumed: 0,
                header: None,
            });
        }
        let records: Vec<&[u8]> = split
            .records
            .iter()
            .map(|r| encoding::trim(r, ORNAMENT))
            .collect();
        if records.len() < 4 {
            return Err(Error::Unsupported(format!(
                "header needs at least 4 records, got {}",
                records.len()
            )));
        }
        if records[0] != HEADER_IDENTITY.as_bytes() {
            return Err(Error::Unsupported(format!(
                "expected header identity {:?}",
                HEADER_IDENTITY
            )));
        }

        let app_name = expect_value(records[1], "app")?;
        let start_text = expect_value(records[2], "start-up")?;
        let start_up = time::parse_iso8601(&start_text)
            .map_err(as_format)
            .map(|ts| LogTimestamp::utc(ts.to_utc(tz)))?;
        let seq_text = expect_value(records[3], "seq-no")?;
        let seq_no: u64 = seq_text
            .parse()
            .map_err(|_| Error::Format(format!("seq-no is not an integer: {:?}", seq_text)))?;
        if seq_no == 0 {
            return Err(Error::Format("seq-no must be positive".to_string()));
        }

        let mut misc = Vec::new();
        for record in &records[4..] {
            let kv = encoding::parse_kv(record).map_err(as_format)?;
            let key = decode_text(kv.key)?;
            let value = match kv.value {
                Some(v) => decode_text(v)?,
                None => String::new(),
            };
            misc.push((key, value));
        }

        Ok(HeaderParse {
            need_more: false,
            consumed: split.consumed,
            header: Some(Header {
                app_name,
                start_up,
                seq_no,
                misc,
            }),
        })
    }
}

fn push_mandatory(out: &mut String, record: &str) {
    out.push(RECORD_SEPARATOR as char);
    out.push_str(VISUAL_RECORD_SEPARATOR);
    out.push_str(record);
}

/// Parses a record as key/value, requiring the decoded key to match.
fn expect_value(record: &[u8], expected: &str) -> Result<String> {
    let kv = encoding::parse_kv(record).map_err(as_format)?;
    let key = decode_text(kv.key)?;
    if key != expected {
        return Err(Error::Format(format!(
            "expected {:?} record, found {:?}",
            expected, key
        )));
    }
    let value = kv
        .value
        .ok_or_else(|| Error::Format(format!("{:?} record has no value", expected)))?;
    decode_text(value)
}

fn decode_text(bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Error::Format("record is not valid UTF-8".to_string()))?;
    encoding::decode(text).map_err(as_format)
}

fn as_format(err: Error) -> Error {
    match err {
        Error::Format(_) => err,
        other => Error::Format(other.to_string()),
    }
}
