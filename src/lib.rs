//! slflog - a structured logfile codec and router.
//!
//! slflog serialises structured log events into a self-describing text
//! stream that is both human-readable and machine-parseable, routes that
//! stream into a size-capped, sequence-numbered set of logfiles (plus
//! optional console mirrors and user sinks), and parses such files back
//! into typed elements.
//!
//! # Wire format
//!
//! A logfile is a sequence of *entities*: one header followed by events,
//! each terminated by the entity separator byte (`0x1E`). Entities are
//! composed of *records* terminated by the record separator byte (`0x1F`);
//! anything that would collide with the framing is percent-escaped. See
//! [`encoding`] for the byte-level rules and [`header`]/[`element`] for
//! the two entity layouts.
//!
//! # Key concepts
//!
//! - **[`Router`]**: owns the active logfile, rolls it over at the size
//!   cap, retains a bounded number of prior files, and fans entities out
//!   to consoles and extra sinks.
//! - **[`LogEvent`]**: one event from the host framework - a timestamp, a
//!   level, and an ordered list of [`Detail`] values.
//! - **[`ElementReader`]**: incremental reader producing parsed elements
//!   from a byte stream.
//!
//! # Example
//!
//! ```ignore
//! use slflog::{Config, Detail, LogEvent, LogTimestamp, Router};
//! use tokio_util::sync::CancellationToken;
//!
//! let router = Router::new(Config::default())?;
//! let event = LogEvent {
//!     time: LogTimestamp::utc(chrono::Utc::now()),
//!     level: "Info".into(),
//!     developer_forced: false,
//!     details: vec![Detail::Message("service started".into())],
//! };
//! router.forward(&[event], &CancellationToken::new()).await?;
//! router.flush(&CancellationToken::new()).await?;
//! ```

mod clock;
mod config;
mod dump;
mod element;
pub mod encoding;
mod error;
mod event;
mod format;
mod fs;
mod header;
mod reader;
mod router;
mod sink;
mod time;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{
    Config, DEFAULT_FILE_NAME_FORMAT, DEFAULT_KEEP_LOGFILES, DEFAULT_MAX_LOGFILE_SIZE,
};
pub use dump::{dump, DumpOptions};
pub use element::{serialize_event, EVENT_IDENTITY};
pub use error::{Error, Result};
pub use event::{Detail, DetailKind, EventArgument, EventId, ExceptionInfo, LogEvent};
pub use format::{
    event_id_json, BinaryFormatter, DetailFormatter, EventIdFormatter, ExceptionFormatter,
    FormatterRegistry, MessageFormatter,
};
pub use fs::{ByteStream, FileSystem, MemoryFileSystem, OsFileSystem};
pub use header::{Header, HeaderParse, Identification, HEADER_IDENTITY};
pub use reader::{Element, ElementReader, MAX_BUFFER_SIZE, SINGLE_READ};
pub use router::Router;
pub use sink::{BufferSink, SensitiveCipher, Sink};
pub use time::{
    from_unix_seconds, parse_iso8601, parse_iso8601_offset, to_iso8601, unix_seconds,
    LogTimestamp, TimeKind,
};
