//! Output sink and cipher capabilities.
//!
//! Extra sinks receive every serialised entity after the file and console
//! mirrors. They are owned by the caller; the router holds references and
//! never disposes them. All sink failures except cancellation are
//! swallowed by the router.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A text-writer capability fed by the router.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Delivers one serialised entity.
    async fn write(&self, text: &str, cancel: &CancellationToken) -> Result<()>;

    /// Flushes any buffered output.
    async fn flush(&self, cancel: &CancellationToken) -> Result<()>;

    /// Releases resources the sink created itself. Must not close an
    /// underlying stream the sink did not create.
    fn dispose(&self) {}
}

/// A sink that collects everything written to it. Useful as a template
/// for user sinks and for observing router output in tests.
#[derive(Default)]
pub struct BufferSink {
    buffer: Mutex<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        self.buffer.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for BufferSink {
    async fn write(&self, text: &str, _cancel: &CancellationToken) -> Result<()> {
        self.buffer.lock().unwrap().push_str(text);
        Ok(())
    }

    async fn flush(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}

/// Symmetric-cipher capability used for sensitive blocks.
///
/// The router serialises the inner details of a sensitive block, encrypts
/// the UTF-8 bytes of the result, and places the serialised ciphertext in
/// a single value record.
pub trait SensitiveCipher: Send + Sync {
    /// Encrypts a plaintext block.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Renders ciphertext in a form suitable for a value record.
    fn serialize(&self, ciphertext: &[u8]) -> String;
}
