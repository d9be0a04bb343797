//! Router configuration.
//!
//! [`Config`] is a plain value object; a builder façade, when one exists,
//! lives with the host application. The router snapshots the configuration
//! on [`reconfigure`](crate::Router::reconfigure) and treats the formatter
//! registry and capability references as immutable from then on.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::format::FormatterRegistry;
use crate::sink::{SensitiveCipher, Sink};

/// Default byte cap per logfile.
pub const DEFAULT_MAX_LOGFILE_SIZE: u64 = 25 * 1024 * 1024;

/// Default number of historical logfiles retained.
pub const DEFAULT_KEEP_LOGFILES: u32 = 5;

/// Default file-name template.
pub const DEFAULT_FILE_NAME_FORMAT: &str = "{app-name}-{start-up-time}-{seq-no}.slf.log";

/// Configuration snapshot consumed by the router.
#[derive(Clone)]
pub struct Config {
    /// Application name, interpolated into file names and stored in each
    /// header. Defaults to the host executable's name, or `"None"` when
    /// that cannot be determined.
    pub app_name: String,

    /// Mirror each entity to standard output.
    pub write_to_console: bool,

    /// Mirror each entity to the debug console (standard error).
    pub write_to_debug_console: bool,

    /// Write entities to the logfile set.
    pub write_to_disk: bool,

    /// Directory for logfiles.
    pub path: PathBuf,

    /// File-name template. Recognised tokens: `{app-name}`,
    /// `{start-up-time}`, `{creation-time}`, `{seq-no}`.
    pub file_name_format: String,

    /// Byte cap per file. When a write pushes the file past this size, the
    /// file is closed and the next event opens a successor. Must be
    /// positive.
    pub maximum_logfile_size: u64,

    /// Number of historical files retained when a new file is created.
    /// `None` disables retention entirely.
    pub keep_logfiles: Option<u32>,

    /// Per-detail-variant formatters.
    pub formatters: FormatterRegistry,

    /// Cipher for sensitive blocks. Without one, sensitive blocks are
    /// dropped.
    pub sensitive: Option<Arc<dyn SensitiveCipher>>,

    /// Additional sinks receiving every entity, in order.
    pub extra_sinks: Vec<Arc<dyn Sink>>,

    /// Strip framing bytes from console mirrors.
    pub console_beautified: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: host_app_name(),
            write_to_console: false,
            write_to_debug_console: false,
            write_to_disk: true,
            path: PathBuf::from("./logs"),
            file_name_format: DEFAULT_FILE_NAME_FORMAT.to_string(),
            maximum_logfile_size: DEFAULT_MAX_LOGFILE_SIZE,
            keep_logfiles: Some(DEFAULT_KEEP_LOGFILES),
            formatters: FormatterRegistry::with_builtins(),
            sensitive: None,
            extra_sinks: Vec::new(),
            console_beautified: false,
        }
    }
}

impl Config {
    /// Checks the numeric constraints.
    pub fn validate(&self) -> Result<()> {
        if self.maximum_logfile_size == 0 {
            return Err(Error::InvalidArg(
                "maximum_logfile_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_name", &self.app_name)
            .field("write_to_console", &self.write_to_console)
            .field("write_to_debug_console", &self.write_to_debug_console)
            .field("write_to_disk", &self.write_to_disk)
            .field("path", &self.path)
            .field("file_name_format", &self.file_name_format)
            .field("maximum_logfile_size", &self.maximum_logfile_size)
            .field("keep_logfiles", &self.keep_logfiles)
            .field("formatters", &self.formatters)
            .field("sensitive", &self.sensitive.is_some())
            .field("extra_sinks", &self.extra_sinks.len())
            .field("console_beautified", &self.console_beautified)
            .finish()
    }
}

fn host_app_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "None".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_disk_only_output() {
        // given
        let config = Config::default();

        // then
        assert!(config.write_to_disk);
        assert!(!config.write_to_console);
        assert!(!config.write_to_debug_console);
        assert_eq!(config.path, PathBuf::from("./logs"));
        assert_eq!(config.maximum_logfile_size, DEFAULT_MAX_LOGFILE_SIZE);
        assert_eq!(config.keep_logfiles, Some(DEFAULT_KEEP_LOGFILES));
        assert!(!config.app_name.is_empty());
    }

    #[test]
    fn should_reject_zero_logfile_size() {
        // given
        let config = Config {
            maximum_logfile_size: 0,
            ..Default::default()
        };

        // when
        let result = config.validate();

        // then
        assert!(matches!(result, Err(Error::InvalidArg(_))));
    }

    #[test]
    fn should_accept_disabled_retention() {
        // given
        let config = Config {
            keep_logfiles: None,
            ..Default::default()
        };

        // then
        assert!(config.validate().is_ok());
    }
}
