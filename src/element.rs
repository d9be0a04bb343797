//! The event entity.
//!
//! An event serialises as the `EVENT` identity record, a fixed run of
//! header records (timestamp, level, hierarchy, event-id, `Dev` flag) and
//! one value record per payload detail:
//!
//! ```text
//! EVENT<RS> 2024-03-05T07:08:09.1230000+01:00<RS> == Info<RS> == app.db<RS> == 1.2 Connect.Failed
//! <RS> == `Message`=`connection refused`
//! <RS>    `EventID`=`{"en":[1,2],"et":["Connect","Failed"]}`
//! <ES>
//! ```
//!
//! The timestamp record is prefixed with a single space instead of the
//! visual separator; that asymmetry with the header entity is part of the
//! wire format. Every event ends with a newline before its entity
//! separator, whether or not it carries value records.

use crate::config::Config;
use crate::encoding::{
    self, ENTITY_SEPARATOR, INDENT, QUOTE, RECORD_SEPARATOR, VISUAL_RECORD_SEPARATOR,
};
use crate::error::Result;
use crate::event::{Detail, LogEvent};
use crate::time;

/// Identity literal of an event entity.
pub const EVENT_IDENTITY: &str = "EVENT";

/// Serialises one event as one entity, terminated by the entity separator.
///
/// Selection rules: the first hierarchy detail becomes the hierarchy
/// header record, the first event-id detail is inlined into the header,
/// and every event-id detail that carries arguments is re-emitted as an
/// `EventID` value record. Sensitive blocks are folded into a single
/// encrypted record; a block that cannot be encrypted is dropped entirely.
pub fn serialize_event(event: &LogEvent, config: &Config) -> Result<String> {
    let mut out = String::new();
    out.push_str(EVENT_IDENTITY);

    out.push(RECORD_SEPARATOR as char);
    out.push(' ');
    out.push_str(&time::to_iso8601(&event.time));

    push_header_record(&mut out, &encoding::encode(&event.level, &[]));

    let hierarchy = event.details.iter().find_map(|d| match d {
        Detail::Hierarchy(segments) => Some(segments),
        _ => None,
    });
    if let Some(segments) = hierarchy {
        let encoded: Vec<String> = segments
            .iter()
            .map(|s| encoding::encode(s, &[QUOTE, b'.']))
            .collect();
        push_header_record(&mut out, &encoded.join("."));
    }

    let event_id = event.details.iter().find_map(|d| match d {
        Detail::EventId(id) => Some(id),
        _ => None,
    });
    if let Some(id) = event_id {
        push_header_record(&mut out, &encoding::encode(&id.to_string(), &[]));
    }

    if event.developer_forced {
        push_header_record(&mut out, "Dev");
    }

    let mut records = Vec::new();
    collect_value_records(&event.details, config, &mut records)?;
    for (i, record) in records.iter().enumerate() {
        out.push(RECORD_SEPARATOR as char);
        if i == 0 {
            out.push_str(VISUAL_RECORD_SEPARATOR);
        } else {
            out.push('\n');
            out.push_str(INDENT);
        }
        out.push_str(record);
    }

    out.push('\n');
    out.push(ENTITY_SEPARATOR as char);
    Ok(out)
}

fn push_header_record(out: &mut String, record: &str) {
    out.push(RECORD_SEPARATOR as char);
    out.push_str(VISUAL_RECORD_SEPARATOR);
    out.push_str(record);
}

/// Walks the detail list, producing value-record texts in order.
///
/// Hierarchy details are consumed by the header and skipped here.
/// Event-ids only produce a record when they carry arguments. Sensitive
/// fences fold their enclosed run into one encrypted record, honouring
/// nesting; a stray end fence is ignored.
fn collect_value_records(
    details: &[Detail],
    config: &Config,
    records: &mut Vec<String>,
) -> Result<()> {
    let mut i = 0;
    while i < details.len() {
        match &details[i] {
            Detail::Hierarchy(_) | Detail::SensitiveEnd => {
                i += 1;
            }
            Detail::SensitiveBegin => {
                let (inner, next) = sensitive_block(details, i);
                if let Some(record) = encrypt_block(inner, config)? {
                    records.push(record);
                }
                i = next;
            }
            Detail::EventId(id) if !id.has_arguments() => {
                i += 1;
            }
            detail => {
                if let Some(record) = format_detail(detail, config)? {
                    records.push(record);
                }
                i += 1;
            }
        }
    }
    Ok(())
}

fn format_detail(detail: &Detail, config: &Config) -> Result<Option<String>> {
    let Some(formatter) = config.formatters.get(detail.kind()) else {
        tracing::warn!(kind = ?detail.kind(), "no formatter registered; detail skipped");
        return Ok(None);
    };
    let text = formatter.format(detail)?;
    let key = detail.record_key().unwrap_or("Detail");
    Ok(Some(format!(
        "`{}`=`{}`",
        encoding::encode(key, &[QUOTE]),
        encoding::encode(&text, &[QUOTE])
    )))
}

/// Returns the details inside the block opened at `begin` and the index
/// just past its end fence. A block with no matching end fence extends to
/// the end of the list.
fn sensitive_block(details: &[Detail], begin: usize) -> (&[Detail], usize) {
    let mut depth = 1usize;
    let mut j = begin + 1;
    while j < details.len() {
        match details[j] {
            Detail::SensitiveBegin => depth += 1,
            Detail::SensitiveEnd => {
                depth -= 1;
                if depth == 0 {
                    return (&details[begin + 1..j], j + 1);
                }
            }
            _ => {}
        }
        j += 1;
    }
    (&details[begin + 1..], details.len())
}

/// Serialises the inner details as if they stood alone (every record in
/// continuation form) and encrypts the result. Returns `None` when the
/// block has to be dropped.
fn encrypt_block(inner: &[Detail], config: &Config) -> Result<Option<String>> {
    let Some(cipher) = &config.sensitive else {
        tracing::warn!("sensitive block without a configured cipher; block dropped");
        return Ok(None);
    };
    let mut inner_records = Vec::new();
    collect_value_records(inner, config, &mut inner_records)?;
    let mut plaintext = String::new();
    for record in &inner_records {
        plaintext.push(RECORD_SEPARATOR as char);
        plaintext.push('\n');
        plaintext.push_str(INDENT);
        plaintext.push_str(record);
    }
    match cipher.encrypt(plaintext.as_bytes()) {
        Ok(ciphertext) => Ok(Some(cipher.serialize(&ciphertext))),
        Err(e) => {
            tracing::warn!(error = %e, "sensitive block encryption failed; block dropped");
            Ok(None)
        }
    }
}
