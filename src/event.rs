//! Core data types for log events.
//!
//! A [`LogEvent`] is what the host logging framework hands to the router:
//! a timestamp, a level, flags, and an ordered list of [`Detail`] values.
//! Details carry the event's payload — messages, binary blobs, event
//! identifiers, exceptions — plus structural markers: the logger hierarchy
//! and the begin/end fences of sensitive blocks.

use std::fmt;

use bytes::Bytes;

use crate::time::LogTimestamp;

/// One log event as produced by the host framework.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// When the event was produced.
    pub time: LogTimestamp,
    /// Level text, e.g. `Info` or `Error`. The codec treats it as opaque.
    pub level: String,
    /// Whether the event was forced past the active minimum level.
    pub developer_forced: bool,
    /// Payload details in the order the framework attached them.
    pub details: Vec<Detail>,
}

/// Discriminates the closed set of detail variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailKind {
    Message,
    Binary,
    EventId,
    Exception,
    Hierarchy,
    SensitiveBegin,
    SensitiveEnd,
}

/// A single payload detail of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    /// Free text. CR and LF survive serialisation.
    Message(String),
    /// A binary payload, rendered as a hex dump.
    Binary(Bytes),
    /// A structured event identifier.
    EventId(EventId),
    /// An error with its causal chain.
    Exception(ExceptionInfo),
    /// Dot-joined path of the logger instance that produced the event.
    Hierarchy(Vec<String>),
    /// Opens a sensitive block; everything up to the matching
    /// [`Detail::SensitiveEnd`] is encrypted as one blob.
    SensitiveBegin,
    /// Closes a sensitive block.
    SensitiveEnd,
}

impl Detail {
    pub fn kind(&self) -> DetailKind {
        match self {
            Detail::Message(_) => DetailKind::Message,
            Detail::Binary(_) => DetailKind::Binary,
            Detail::EventId(_) => DetailKind::EventId,
            Detail::Exception(_) => DetailKind::Exception,
            Detail::Hierarchy(_) => DetailKind::Hierarchy,
            Detail::SensitiveBegin => DetailKind::SensitiveBegin,
            Detail::SensitiveEnd => DetailKind::SensitiveEnd,
        }
    }

    /// Record key under which the detail is emitted, when it has one.
    pub fn record_key(&self) -> Option<&'static str> {
        match self {
            Detail::Message(_) => Some("Message"),
            Detail::Binary(_) => Some("Binary"),
            Detail::EventId(_) => Some("EventID"),
            Detail::Exception(_) => Some("Exception"),
            _ => None,
        }
    }
}

/// Structured event identifier: a numeric chain, a textual chain, and
/// named arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventId {
    pub numbers: Vec<u64>,
    pub texts: Vec<String>,
    pub arguments: Vec<EventArgument>,
}

impl EventId {
    pub fn new(numbers: Vec<u64>, texts: Vec<String>) -> Self {
        Self {
            numbers,
            texts,
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, name: Option<&str>, value: &str) -> Self {
        self.arguments.push(EventArgument {
            name: name.map(str::to_owned),
            value: value.to_owned(),
        });
        self
    }

    pub fn has_arguments(&self) -> bool {
        !self.arguments.is_empty()
    }
}

/// Human-readable inline form: numeric chain, textual chain, and an
/// argument block, e.g. `` 1.2 Connect.Failed {host=`db1`} ``.
impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if !self.numbers.is_empty() {
            let chain: Vec<String> = self.numbers.iter().map(u64::to_string).collect();
            parts.push(chain.join("."));
        }
        if !self.texts.is_empty() {
            parts.push(self.texts.join("."));
        }
        if !self.arguments.is_empty() {
            let args: Vec<String> = self
                .arguments
                .iter()
                .map(|a| match &a.name {
                    Some(name) => format!("{}=`{}`", name, a.value),
                    None => format!("`{}`", a.value),
                })
                .collect();
            parts.push(format!("{{{}}}", args.join(", ")));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// One argument of an [`EventId`]. Unnamed arguments keep `name = None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArgument {
    pub name: Option<String>,
    pub value: String,
}

/// An error and its causal chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Type or classification of the error.
    pub type_name: String,
    /// Human-readable description.
    pub message: String,
    /// Captured frames, outermost first.
    pub frames: Vec<String>,
    /// The error this one wraps, if any.
    pub cause: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    pub fn new(type_name: &str, message: &str) -> Self {
        Self {
            type_name: type_name.to_owned(),
            message: message.to_owned(),
            frames: Vec::new(),
            cause: None,
        }
    }

    pub fn with_frames(mut self, frames: &[&str]) -> Self {
        self.frames = frames.iter().map(|f| (*f).to_owned()).collect();
        self
    }

    pub fn caused_by(mut self, cause: ExceptionInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}
