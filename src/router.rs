//! Event routing: files, consoles, and extra sinks.
//!
//! The router owns the active logfile exclusively. The first disk write
//! after (re)configuration creates the directory if needed, runs retention
//! over what is already there, allocates the next sequence number and
//! opens a fresh file with a header entity. A write that pushes the file
//! past the configured cap closes it; the next event opens a successor.
//!
//! Log output is best-effort: disk faults, console faults, broken extra
//! sinks and retention failures never propagate to the producer. Only
//! cancellation and programmatic misuse are re-raised.
//!
//! All operations are serialised by one lock. Within a batch, events are
//! processed strictly in input order; cancellation is checked at entry,
//! between events, and between extra-sink writes.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::element;
use crate::encoding::{ENTITY_SEPARATOR, RECORD_SEPARATOR};
use crate::error::{Error, Result};
use crate::event::LogEvent;
use crate::fs::{FileSystem, OsFileSystem};
use crate::header::Header;
use crate::reader::{Element, ElementReader};
use crate::time::{self, LogTimestamp};

/// Routes serialised events to the logfile set and the configured sinks.
pub struct Router {
    inner: Mutex<RouterInner>,
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    start_time: DateTime<Local>,
}

struct RouterInner {
    config: Config,
    file: Option<File>,
    bytes_written: u64,
    seq_no: u64,
}

impl Router {
    /// Creates a router on the real filesystem and clock.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_capabilities(config, Arc::new(OsFileSystem), Arc::new(SystemClock))
    }

    /// Creates a router with explicit capabilities.
    ///
    /// The clock is read once here to capture the process start time used
    /// in file names and headers.
    pub fn with_capabilities(
        config: Config,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let start_time = clock.now_local();
        Ok(Self {
            inner: Mutex::new(RouterInner {
                config,
                file: None,
                bytes_written: 0,
                seq_no: 0,
            }),
            fs,
            clock,
            start_time,
        })
    }

    /// Replaces the configuration snapshot.
    ///
    /// An open file is retained; the new configuration takes effect at the
    /// next rollover.
    pub async fn reconfigure(&self, config: Config) -> Result<()> {
        config.validate()?;
        let mut inner = self.inner.lock().await;
        inner.config = config;
        Ok(())
    }

    /// Reserved for background writers; currently nothing to start.
    pub fn start(&self) {}

    /// Reserved for background writers; currently nothing to stop. The
    /// open file is released when the router is dropped.
    pub fn stop(&self) {}

    /// Delivers a batch of events to every enabled sink, in order.
    pub async fn forward(&self, batch: &[LogEvent], cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut inner = self.inner.lock().await;
        for event in batch {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let text = match element::serialize_event(event, &inner.config) {
                Ok(text) => text,
                Err(e) if e.must_propagate() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "event serialisation failed; event skipped");
                    continue;
                }
            };

            if inner.config.write_to_disk {
                if let Err(e) = self.write_to_file(&mut inner, &text, cancel).await {
                    if e.must_propagate() {
                        return Err(e);
                    }
                    tracing::warn!(error = %e, "logfile write failed; event lost on disk");
                }
            }

            if inner.config.write_to_console || inner.config.write_to_debug_console {
                let console_text = if inner.config.console_beautified {
                    beautify(&text)
                } else {
                    text.clone()
                };
                if inner.config.write_to_console {
                    if let Err(e) = write_console(tokio::io::stdout(), &console_text).await {
                        tracing::warn!(error = %e, "console write failed");
                    }
                }
                if inner.config.write_to_debug_console {
                    if let Err(e) = write_console(tokio::io::stderr(), &console_text).await {
                        tracing::warn!(error = %e, "debug console write failed");
                    }
                }
            }

            let sinks = inner.config.extra_sinks.clone();
            for sink in sinks {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                match sink.write(&text, cancel).await {
                    Ok(()) => {}
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => tracing::warn!(error = %e, "extra sink write failed"),
                }
            }
        }
        Ok(())
    }

    /// Flushes the open file and every extra sink.
    pub async fn flush(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut inner = self.inner.lock().await;
        if let Some(file) = inner.file.as_mut() {
            if let Err(e) = file.flush().await {
                tracing::warn!(error = %e, "logfile flush failed");
            }
        }
        let sinks = inner.config.extra_sinks.clone();
        for sink in sinks {
            match sink.flush(cancel).await {
                Ok(()) => {}
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => tracing::warn!(error = %e, "extra sink flush failed"),
            }
        }
        Ok(())
    }

    async fn write_to_file(
        &self,
        inner: &mut RouterInner,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if inner.file.is_none() {
            self.open_next_file(inner, cancel).await?;
        }
        let Some(file) = inner.file.as_mut() else {
            return Err(Error::Internal("no open file after open".to_string()));
        };
        file.write_all(text.as_bytes()).await?;
        inner.bytes_written += text.len() as u64;

        if inner.bytes_written >= inner.config.maximum_logfile_size {
            let mut file = inner
                .file
                .take()
                .ok_or_else(|| Error::Internal("file vanished during rollover".to_string()))?;
            inner.bytes_written = 0;
            file.flush().await?;
        }
        Ok(())
    }

    async fn open_next_file(&self, inner: &mut RouterInner, cancel: &CancellationToken) -> Result<()> {
        let dir = inner.config.path.clone();
        if tokio::fs::try_exists(&dir).await? {
            if let Err(e) = self.run_retention(&inner.config, cancel).await {
                if e.must_propagate() {
                    return Err(e);
                }
                tracing::warn!(error = %e, "retention failed; continuing with new file");
            }
        } else {
            tokio::fs::create_dir_all(&dir).await?;
        }

        inner.seq_no += 1;
        let creation = self.clock.now_local();
        let name = interpolate_file_name(
            &inner.config.file_name_format,
            &inner.config.app_name,
            &self.start_time.naive_local(),
            &creation.naive_local(),
            inner.seq_no,
        );
        let path = dir.join(name);
        let mut file = File::create(&path).await?;

        let header = Header::new(
            &inner.config.app_name,
            LogTimestamp::local(self.start_time),
            inner.seq_no,
        );
        let header_text = header.serialize();
        file.write_all(header_text.as_bytes()).await?;
        inner.bytes_written = header_text.len() as u64;
        inner.file = Some(file);
        tracing::debug!(path = %path.display(), seq_no = inner.seq_no, "opened logfile");
        Ok(())
    }

    /// Deletes the oldest matching logfiles beyond the retention count.
    ///
    /// Candidates are directory entries matching the literal prefix and
    /// suffix of the file-name template whose headers parse; they are
    /// ranked ascending by start-up time, then sequence number.
    async fn run_retention(&self, config: &Config, cancel: &CancellationToken) -> Result<()> {
        let Some(keep) = config.keep_logfiles else {
            return Ok(());
        };
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let creation = self.clock.now_local();
        let rendered = interpolate_file_name(
            &config.file_name_format,
            &config.app_name,
            &self.start_time.naive_local(),
            &creation.naive_local(),
            1,
        );
        let prefix = common_prefix(&rendered, &config.file_name_format);
        let suffix = common_suffix(&rendered, &config.file_name_format);

        let entries = self.fs.enumerate(&config.path).await?;
        let mut ranked: Vec<(DateTime<chrono::Utc>, u64, PathBuf)> = Vec::new();
        for path in entries {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.len() < prefix.len() + suffix.len()
                || !name.starts_with(prefix)
                || !name.ends_with(suffix)
            {
                continue;
            }
            match self.read_logfile_header(&path, cancel).await {
                Ok(header) => {
                    ranked.push((header.start_up.to_utc(None), header.seq_no, path));
                }
                Err(e) if e.must_propagate() => return Err(e),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "not a parseable logfile; ignored");
                }
            }
        }

        ranked.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        let excess = ranked.len().saturating_sub(keep as usize);
        for (_, _, path) in ranked.into_iter().take(excess) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let Err(e) = self.fs.delete(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "could not delete logfile");
            }
        }
        Ok(())
    }

    async fn read_logfile_header(
        &self,
        path: &std::path::Path,
        cancel: &CancellationToken,
    ) -> Result<Header> {
        let stream = self.fs.open_for_reading(path).await?;
        let mut reader = ElementReader::new(stream);
        match reader.next_element(cancel).await? {
            Some(Element::Header(header)) => Ok(header),
            None => Err(Error::Format("empty logfile".to_string())),
        }
    }
}

/// Expands the file-name template tokens.
fn interpolate_file_name(
    template: &str,
    app_name: &str,
    start: &NaiveDateTime,
    creation: &NaiveDateTime,
    seq_no: u64,
) -> String {
    template
        .replace("{app-name}", app_name)
        .replace("{start-up-time}", &time::format_compact(start))
        .replace("{creation-time}", &time::format_compact(creation))
        .replace("{seq-no}", &seq_no.to_string())
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}

fn common_suffix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .rev()
        .zip(b.bytes().rev())
        .take_while(|(x, y)| x == y)
        .count();
    &a[a.len() - len..]
}

/// Console form of an entity: the framing bytes stripped out.
fn beautify(text: &str) -> String {
    text.chars()
        .filter(|&c| c != ENTITY_SEPARATOR as char && c != RECORD_SEPARATOR as char)
        .collect()
}

async fn write_console<W: tokio::io::AsyncWrite + Unpin>(mut out: W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}
