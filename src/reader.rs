//! Incremental reader over a logfile byte stream.
//!
//! [`ElementReader`] pulls bytes from any `AsyncRead` in small chunks and
//! yields parsed elements. The internal buffer is bounded: a stream that
//! fills it without ever completing an element is rejected rather than
//! growing memory without limit.
//!
//! Event parsing is reserved: after the header has been produced,
//! `next_element` reports the end of the element sequence regardless of
//! trailing bytes. [`Element`] is an enum so event elements can be added
//! without changing the calling contract.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::header::Header;

/// Upper bound on buffered, not-yet-parsed bytes.
pub const MAX_BUFFER_SIZE: usize = 32 * 1024;

/// Chunk size for each read from the underlying stream.
pub const SINGLE_READ: usize = 4 * 1024;

/// One parsed element of a logfile stream.
#[derive(Debug)]
pub enum Element {
    Header(Header),
}

/// Reads elements from a byte stream.
pub struct ElementReader<R> {
    stream: R,
    buffer: BytesMut,
    header_seen: bool,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> ElementReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(SINGLE_READ),
            header_seen: false,
            exhausted: false,
        }
    }

    /// Produces the next element, or `None` at the end of the sequence.
    ///
    /// The first element of a well-formed stream is always the header; a
    /// stream beginning with anything else fails with `Format`. I/O errors
    /// and cancellation pass through unchanged; every other parse failure
    /// is reported as `Format`.
    pub async fn next_element(&mut self, cancel: &CancellationToken) -> Result<Option<Element>> {
        if self.header_seen {
            // Event parsing is reserved.
            return Ok(None);
        }
        let mut chunk = vec![0u8; SINGLE_READ];
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if !self.exhausted {
                if self.buffer.len() >= MAX_BUFFER_SIZE {
                    return Err(Error::Format(
                        "buffer full without a complete element".to_string(),
                    ));
                }
                let n = self.stream.read(&mut chunk).await?;
                if n == 0 {
                    self.exhausted = true;
                } else {
                    self.buffer.extend_from_slice(&chunk[..n]);
                }
            }

            let id = Header::identify(&self.buffer);
            if id.need_more {
                if self.exhausted {
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    return Err(Error::Format(
                        "incomplete element at end of stream".to_string(),
                    ));
                }
                continue;
            }
            if !id.compatible {
                return Err(Error::Format("header expected first".to_string()));
            }

            let parse = Header::parse(&self.buffer, None).map_err(wrap_as_format)?;
            if parse.need_more {
                if self.exhausted {
                    return Err(Error::Format(
                        "incomplete element at end of stream".to_string(),
                    ));
                }
                continue;
            }
            let header = parse.header.ok_or_else(|| {
                Error::Internal("header parse made no progress".to_string())
            })?;
            let _ = self.buffer.split_to(parse.consumed);
            self.header_seen = true;
            return Ok(Some(Element::Header(header)));
        }
    }
}

fn wrap_as_format(err: Error) -> Error {
    match err {
        Error::Io(_) | Error::Cancelled | Error::Format(_) => err,
        other => Error::Format(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::encoding::ENTITY_SEPARATOR;
    use crate::time::LogTimestamp;

    fn sample_header() -> Header {
        Header::new(
            "ReaderApp",
            LogTimestamp::utc(Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()),
            3,
        )
        .with_misc("host", "db1")
    }

    async fn read_all(bytes: Vec<u8>) -> Result<Option<Element>> {
        let mut reader = ElementReader::new(Cursor::new(bytes));
        reader.next_element(&CancellationToken::new()).await
    }

    #[tokio::test]
    async fn should_read_header_from_stream() {
        // given
        let header = sample_header();
        let bytes = header.serialize().into_bytes();

        // when
        let element = read_all(bytes).await.unwrap();

        // then
        let Some(Element::Header(read)) = element else {
            panic!("expected a header element");
        };
        assert_eq!(read.app_name, "ReaderApp");
        assert_eq!(read.seq_no, 3);
        assert_eq!(read.misc, vec![("host".to_string(), "db1".to_string())]);
    }

    #[tokio::test]
    async fn should_return_none_on_empty_stream() {
        // when
        let element = read_all(Vec::new()).await.unwrap();

        // then
        assert!(element.is_none());
    }

    #[tokio::test]
    async fn should_return_none_after_header_even_with_trailing_bytes() {
        // given - an unparseable tail after the header
        let mut bytes = sample_header().serialize().into_bytes();
        bytes.extend_from_slice(b"INVALID");
        bytes.push(ENTITY_SEPARATOR);
        let mut reader = ElementReader::new(Cursor::new(bytes));
        let cancel = CancellationToken::new();

        // when
        let first = reader.next_element(&cancel).await.unwrap();
        let second = reader.next_element(&cancel).await.unwrap();

        // then
        assert!(matches!(first, Some(Element::Header(_))));
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn should_fail_on_stream_not_starting_with_header() {
        // given
        let bytes = b"GARBAGE\x1Fmore\x1E".to_vec();

        // when
        let result = read_all(bytes).await;

        // then
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[tokio::test]
    async fn should_fail_on_truncated_header() {
        // given
        let text = sample_header().serialize();
        let bytes = text.as_bytes()[..text.len() - 1].to_vec();

        // when
        let result = read_all(bytes).await;

        // then
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[tokio::test]
    async fn should_wrap_structural_mismatch_as_format() {
        // given - identifies as a header but lacks the mandatory records
        let bytes = b"SLF.1\x1Fonly-one-record\x1E".to_vec();

        // when
        let result = read_all(bytes).await;

        // then
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[tokio::test]
    async fn should_fail_when_buffer_fills_without_an_element() {
        // given - a header identity followed by ornament that never
        // completes an entity
        let mut bytes = b"SLF.1".to_vec();
        bytes.extend(std::iter::repeat(b'-').take(MAX_BUFFER_SIZE + SINGLE_READ));

        // when
        let result = read_all(bytes).await;

        // then
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[tokio::test]
    async fn should_read_header_spanning_multiple_chunks() {
        // given - misc records inflate the header past one read chunk
        let mut header = sample_header();
        for i in 0..200 {
            header = header.with_misc(&format!("key-{:03}", i), &"v".repeat(40));
        }
        let bytes = header.serialize().into_bytes();
        assert!(bytes.len() > SINGLE_READ);

        // when
        let element = read_all(bytes).await.unwrap();

        // then
        let Some(Element::Header(read)) = element else {
            panic!("expected a header element");
        };
        assert_eq!(read.misc.len(), 201);
    }

    #[tokio::test]
    async fn should_honour_cancellation() {
        // given
        let bytes = sample_header().serialize().into_bytes();
        let mut reader = ElementReader::new(Cursor::new(bytes));
        let cancel = CancellationToken::new();
        cancel.cancel();

        // when
        let result = reader.next_element(&cancel).await;

        // then
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
