//! Detail formatters.
//!
//! Each detail variant that appears as a value record is rendered by a
//! [`DetailFormatter`]. Formatters are looked up in a
//! [`FormatterRegistry`] keyed by [`DetailKind`]; user code can replace a
//! built-in or register formatters for additional variants. The registry
//! configured on the router is treated as immutable once routing begins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::dump::{self, DumpOptions};
use crate::error::{Error, Result};
use crate::event::{Detail, DetailKind, EventId, ExceptionInfo};

/// Renders one detail variant to the text of its value record.
pub trait DetailFormatter: Send + Sync {
    /// Identification string of this formatter.
    fn id(&self) -> &'static str;

    /// Whether the formatter accepts the given variant.
    fn supports(&self, kind: DetailKind) -> bool;

    /// Produces the record text for `detail`.
    ///
    /// Fails with `Unsupported` when handed a variant the formatter does
    /// not accept.
    fn format(&self, detail: &Detail) -> Result<String>;
}

/// Maps detail variants to their formatters.
#[derive(Clone, Default)]
pub struct FormatterRegistry {
    formatters: HashMap<DetailKind, Arc<dyn DetailFormatter>>,
}

impl FormatterRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            formatters: HashMap::new(),
        }
    }

    /// A registry with the four built-in formatters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(DetailKind::Message, Arc::new(MessageFormatter));
        registry.register(DetailKind::Binary, Arc::new(BinaryFormatter::default()));
        registry.register(DetailKind::EventId, Arc::new(EventIdFormatter));
        registry.register(DetailKind::Exception, Arc::new(ExceptionFormatter));
        registry
    }

    /// Registers `formatter` for `kind`, replacing any previous entry.
    pub fn register(&mut self, kind: DetailKind, formatter: Arc<dyn DetailFormatter>) {
        self.formatters.insert(kind, formatter);
    }

    pub fn get(&self, kind: DetailKind) -> Option<&Arc<dyn DetailFormatter>> {
        self.formatters.get(&kind)
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.formatters.values().map(|v| v.id()).collect();
        f.debug_struct("FormatterRegistry").field("ids", &ids).finish()
    }
}

fn unsupported(id: &str, detail: &Detail) -> Error {
    Error::Unsupported(format!(
        "formatter {:?} cannot format {:?} details",
        id,
        detail.kind()
    ))
}

/// Emits message text unchanged; CR and LF are preserved.
pub struct MessageFormatter;

impl DetailFormatter for MessageFormatter {
    fn id(&self) -> &'static str {
        "message"
    }

    fn supports(&self, kind: DetailKind) -> bool {
        kind == DetailKind::Message
    }

    fn format(&self, detail: &Detail) -> Result<String> {
        match detail {
            Detail::Message(text) => Ok(text.clone()),
            other => Err(unsupported(self.id(), other)),
        }
    }
}

/// Renders binary payloads as a hex dump.
///
/// Quote marks in the transcript are substituted so the result is safe
/// inside a quoted value record.
pub struct BinaryFormatter {
    options: DumpOptions,
}

impl Default for BinaryFormatter {
    fn default() -> Self {
        Self {
            options: DumpOptions::default(),
        }
    }
}

impl DetailFormatter for BinaryFormatter {
    fn id(&self) -> &'static str {
        "binary"
    }

    fn supports(&self, kind: DetailKind) -> bool {
        kind == DetailKind::Binary
    }

    fn format(&self, detail: &Detail) -> Result<String> {
        match detail {
            Detail::Binary(bytes) => {
                let mut text = String::from("Hex dump:\n");
                if !bytes.is_empty() {
                    let rendered = dump::dump(bytes, 0, bytes.len(), &self.options)?;
                    text.push_str(&rendered.replace('`', &self.options.substitute.to_string()));
                }
                Ok(text)
            }
            other => Err(unsupported(self.id(), other)),
        }
    }
}

/// Renders event identifiers as their JSON projection.
pub struct EventIdFormatter;

impl DetailFormatter for EventIdFormatter {
    fn id(&self) -> &'static str {
        "event-id"
    }

    fn supports(&self, kind: DetailKind) -> bool {
        kind == DetailKind::EventId
    }

    fn format(&self, detail: &Detail) -> Result<String> {
        match detail {
            Detail::EventId(id) => event_id_json(id),
            other => Err(unsupported(self.id(), other)),
        }
    }
}

#[derive(Serialize)]
struct EventIdJson<'a> {
    en: &'a [u64],
    et: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    a: Option<Vec<ArgumentJson<'a>>>,
}

#[derive(Serialize)]
struct ArgumentJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<&'a str>,
    v: &'a str,
}

/// JSON projection of an event-id: `{"en":[…],"et":[…],"a":[…]}` where
/// `a` is omitted without arguments and `n` is omitted for an unnamed
/// argument.
pub fn event_id_json(id: &EventId) -> Result<String> {
    let arguments = if id.arguments.is_empty() {
        None
    } else {
        Some(
            id.arguments
                .iter()
                .map(|a| ArgumentJson {
                    n: a.name.as_deref(),
                    v: &a.value,
                })
                .collect(),
        )
    };
    let projection = EventIdJson {
        en: &id.numbers,
        et: &id.texts,
        a: arguments,
    };
    serde_json::to_string(&projection)
        .map_err(|e| Error::Internal(format!("event-id projection failed: {}", e)))
}

/// Renders an exception with its causal chain, one entry per cause.
pub struct ExceptionFormatter;

impl DetailFormatter for ExceptionFormatter {
    fn id(&self) -> &'static str {
        "exception"
    }

    fn supports(&self, kind: DetailKind) -> bool {
        kind == DetailKind::Exception
    }

    fn format(&self, detail: &Detail) -> Result<String> {
        match detail {
            Detail::Exception(info) => Ok(format_exception(info)),
            other => Err(unsupported(self.id(), other)),
        }
    }
}

fn format_exception(info: &ExceptionInfo) -> String {
    let mut out = String::new();
    let mut current = Some(info);
    let mut first = true;
    while let Some(entry) = current {
        if !first {
            out.push('\n');
            out.push_str("Caused by: ");
        }
        out.push_str(&entry.type_name);
        out.push_str(": ");
        out.push_str(&entry.message);
        for frame in &entry.frames {
            out.push_str("\n    at ");
            out.push_str(frame);
        }
        current = entry.cause.as_deref();
        first = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn should_format_message_unchanged() {
        // given
        let detail = Detail::Message("line one\r\nline two".into());

        // when
        let text = MessageFormatter.format(&detail).unwrap();

        // then
        assert_eq!(text, "line one\r\nline two");
    }

    #[test]
    fn should_reject_wrong_variant() {
        // given
        let detail = Detail::Message("text".into());

        // when
        let result = BinaryFormatter::default().format(&detail);

        // then
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }

    #[test]
    fn should_format_binary_with_dump_header() {
        // given
        let detail = Detail::Binary(Bytes::from_static(b"\x60data\x60"));

        // when
        let text = BinaryFormatter::default().format(&detail).unwrap();

        // then
        assert!(text.starts_with("Hex dump:\n"));
        assert!(text.contains("60 64 61 74 61 60"));
        assert!(!text.contains('`'));
        assert!(text.contains(".data."));
    }

    #[test]
    fn should_format_empty_binary_as_header_only() {
        // given
        let detail = Detail::Binary(Bytes::new());

        // when
        let text = BinaryFormatter::default().format(&detail).unwrap();

        // then
        assert_eq!(text, "Hex dump:\n");
    }

    #[test]
    fn should_project_event_id_with_named_and_unnamed_arguments() {
        // given
        let id = EventId::new(vec![1, 2], vec!["A".into(), "B".into()])
            .with_argument(Some("x"), "1")
            .with_argument(None, "y");

        // when
        let json = event_id_json(&id).unwrap();

        // then
        assert_eq!(
            json,
            r#"{"en":[1,2],"et":["A","B"],"a":[{"n":"x","v":"1"},{"v":"y"}]}"#
        );
    }

    #[test]
    fn should_omit_argument_list_when_empty() {
        // given
        let id = EventId::new(vec![3], vec!["C".into()]);

        // when
        let json = event_id_json(&id).unwrap();

        // then
        assert_eq!(json, r#"{"en":[3],"et":["C"]}"#);
    }

    #[test]
    fn should_format_exception_chain_with_frames() {
        // given
        let inner = ExceptionInfo::new("IoError", "disk full");
        let outer = ExceptionInfo::new("WriteFailed", "could not persist")
            .with_frames(&["write_event", "forward"])
            .caused_by(inner);

        // when
        let text = ExceptionFormatter
            .format(&Detail::Exception(outer))
            .unwrap();

        // then
        assert_eq!(
            text,
            "WriteFailed: could not persist\n    at write_event\n    at forward\nCaused by: IoError: disk full"
        );
    }

    #[test]
    fn should_resolve_builtins_from_registry() {
        // given
        let registry = FormatterRegistry::with_builtins();

        // then
        assert!(registry.get(DetailKind::Message).is_some());
        assert!(registry.get(DetailKind::Binary).is_some());
        assert!(registry.get(DetailKind::EventId).is_some());
        assert!(registry.get(DetailKind::Exception).is_some());
        assert!(registry.get(DetailKind::Hierarchy).is_none());
    }

    #[test]
    fn should_replace_builtin_on_register() {
        // given
        let mut registry = FormatterRegistry::with_builtins();

        // when
        registry.register(DetailKind::Message, Arc::new(MessageFormatter));

        // then
        assert_eq!(registry.get(DetailKind::Message).unwrap().id(), "message");
    }
}
