//! ISO-8601 round-trip codec for logfile timestamps.
//!
//! Timestamps on the wire carry seven fractional-second digits and one of
//! three zone designators: `Z` for UTC, `±HH:MM` for a local offset, or
//! nothing when the zone is unspecified. [`LogTimestamp`] keeps the
//! designator alongside the civil time so serialise/parse is lossless.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Timelike, Utc};

use crate::error::{Error, Result};

/// Zone designator attached to a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    /// The civil time is UTC (`Z` suffix).
    Utc,
    /// The civil time is local to the given offset (`±HH:MM` suffix).
    Local(FixedOffset),
    /// No zone designator.
    Unspecified,
}

/// A civil timestamp plus its zone designator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTimestamp {
    pub datetime: NaiveDateTime,
    pub kind: TimeKind,
}

impl LogTimestamp {
    pub fn utc(datetime: DateTime<Utc>) -> Self {
        Self {
            datetime: datetime.naive_utc(),
            kind: TimeKind::Utc,
        }
    }

    pub fn local(datetime: DateTime<Local>) -> Self {
        Self {
            datetime: datetime.naive_local(),
            kind: TimeKind::Local(datetime.offset().fix()),
        }
    }

    pub fn unspecified(datetime: NaiveDateTime) -> Self {
        Self {
            datetime,
            kind: TimeKind::Unspecified,
        }
    }

    /// Converts to UTC. An unspecified zone is interpreted in `fallback`,
    /// or in the system-local zone when `fallback` is `None`.
    pub fn to_utc(&self, fallback: Option<FixedOffset>) -> DateTime<Utc> {
        let offset_secs = match self.kind {
            TimeKind::Utc => 0,
            TimeKind::Local(off) => off.local_minus_utc(),
            TimeKind::Unspecified => match fallback {
                Some(off) => off.local_minus_utc(),
                None => local_offset(&self.datetime).local_minus_utc(),
            },
        };
        (self.datetime - chrono::Duration::seconds(offset_secs as i64)).and_utc()
    }
}

/// Resolves the system-local offset for a civil time, taking the earlier
/// interpretation when the time is ambiguous.
fn local_offset(datetime: &NaiveDateTime) -> FixedOffset {
    match Local.offset_from_local_datetime(datetime) {
        chrono::LocalResult::Single(off) | chrono::LocalResult::Ambiguous(off, _) => off.fix(),
        chrono::LocalResult::None => Local::now().offset().fix(),
    }
}

/// Serialises a timestamp in round-trip form with seven fractional digits.
pub fn to_iso8601(ts: &LogTimestamp) -> String {
    let base = ts.datetime.format("%Y-%m-%dT%H:%M:%S");
    let fraction = ts.datetime.nanosecond() / 100;
    let suffix = match ts.kind {
        TimeKind::Utc => "Z".to_string(),
        TimeKind::Local(off) => format_offset(off),
        TimeKind::Unspecified => String::new(),
    };
    format!("{}.{:07}{}", base, fraction, suffix)
}

fn format_offset(off: FixedOffset) -> String {
    let total = off.local_minus_utc();
    let sign = if total < 0 { '-' } else { '+' };
    let abs = total.unsigned_abs();
    format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

/// Parses a round-trip ISO-8601 timestamp.
///
/// `Z` yields a UTC kind, an explicit offset yields a local kind, and the
/// absence of a zone yields an unspecified kind. Fails with `InvalidArg`
/// on empty input and `Format` on anything malformed.
pub fn parse_iso8601(text: &str) -> Result<LogTimestamp> {
    if text.is_empty() {
        return Err(Error::InvalidArg("empty timestamp".to_string()));
    }
    let (body, kind) = split_zone(text)?;
    let datetime = parse_naive(body)?;
    Ok(LogTimestamp { datetime, kind })
}

/// Parses a timestamp into a zoned value. Input without a zone designator
/// takes the local base offset.
pub fn parse_iso8601_offset(text: &str) -> Result<DateTime<FixedOffset>> {
    let ts = parse_iso8601(text)?;
    let offset = match ts.kind {
        TimeKind::Utc => Utc.fix(),
        TimeKind::Local(off) => off,
        TimeKind::Unspecified => local_offset(&ts.datetime),
    };
    offset
        .from_local_datetime(&ts.datetime)
        .single()
        .ok_or_else(|| Error::Format(format!("unrepresentable timestamp: {}", text)))
}

fn split_zone(text: &str) -> Result<(&str, TimeKind)> {
    if let Some(body) = text.strip_suffix('Z') {
        return Ok((body, TimeKind::Utc));
    }
    let bytes = text.as_bytes();
    if bytes.len() >= 6 {
        let tail = &bytes[bytes.len() - 6..];
        if (tail[0] == b'+' || tail[0] == b'-') && tail[3] == b':' {
            let hours: i32 = parse_int(&text[text.len() - 5..text.len() - 3])?;
            let minutes: i32 = parse_int(&text[text.len() - 2..])?;
            let secs = hours * 3600 + minutes * 60;
            let secs = if tail[0] == b'-' { -secs } else { secs };
            let off = FixedOffset::east_opt(secs)
                .ok_or_else(|| Error::Format(format!("offset out of range: {}", text)))?;
            return Ok((&text[..text.len() - 6], TimeKind::Local(off)));
        }
    }
    Ok((text, TimeKind::Unspecified))
}

fn parse_int(text: &str) -> Result<i32> {
    text.parse()
        .map_err(|_| Error::Format(format!("invalid number in timestamp: {}", text)))
}

fn parse_naive(body: &str) -> Result<NaiveDateTime> {
    let (seconds_part, fraction_part) = match body.find('.') {
        Some(dot) => (&body[..dot], Some(&body[dot + 1..])),
        None => (body, None),
    };
    let base = NaiveDateTime::parse_from_str(seconds_part, "%Y-%m-%dT%H:%M:%S")
        .map_err(|e| Error::Format(format!("invalid timestamp {:?}: {}", body, e)))?;
    let nanos = match fraction_part {
        None => 0,
        Some(digits) => parse_fraction(digits)?,
    };
    base.with_nanosecond(nanos)
        .ok_or_else(|| Error::Format(format!("invalid fraction in {:?}", body)))
}

fn parse_fraction(digits: &str) -> Result<u32> {
    if digits.is_empty() || digits.len() > 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Format(format!("invalid fraction {:?}", digits)));
    }
    let value: u32 = digits
        .parse()
        .map_err(|_| Error::Format(format!("invalid fraction {:?}", digits)))?;
    Ok(value * 10u32.pow(9 - digits.len() as u32))
}

/// Seconds since 1970-01-01T00:00:00Z; pre-epoch values are negative.
pub fn unix_seconds(ts: &LogTimestamp) -> i64 {
    ts.to_utc(None).timestamp()
}

/// Converts UNIX seconds to a UTC-kind timestamp.
pub fn from_unix_seconds(secs: i64) -> Result<LogTimestamp> {
    let datetime = DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| Error::InvalidArg(format!("seconds out of range: {}", secs)))?;
    Ok(LogTimestamp::utc(datetime))
}

/// Compact `yyyyMMdd-HHmmssfff` form used in file names.
pub(crate) fn format_compact(datetime: &NaiveDateTime) -> String {
    format!(
        "{}{:03}",
        datetime.format("%Y%m%d-%H%M%S"),
        datetime.nanosecond() / 1_000_000
    )
}
