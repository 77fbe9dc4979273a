//! Framed I/O for the IMAP wire format.
//!
//! Server responses are CRLF-terminated lines that may embed literals
//! (`{n}\r\n` followed by `n` raw bytes). A "response" here is one logical
//! unit: the line plus any literals it announces plus the line remainder.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Longest accepted line.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest accepted literal.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered reader/writer speaking IMAP framing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads one complete response, literals included.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, on EOF, or when a line or literal exceeds the
    /// size limits.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(len) = literal_length(&line) else {
                break;
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let start = response.len();
            response.resize(start + len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }

        Ok(response)
    }

    /// Reads responses until the completion for `tag` arrives.
    ///
    /// The tagged completion is the last element of the returned vector.
    ///
    /// # Errors
    ///
    /// Propagates any [`read_response`](Self::read_response) failure.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        loop {
            let response = self.read_response().await?;
            let done = is_tagged(&response, tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    /// Sends a serialized command and reads up to its completion.
    ///
    /// `parts` is the output of [`Command::serialize`](crate::Command::serialize);
    /// each literal waits for the server's continuation request. The tagged
    /// completion is the last element of the returned vector.
    ///
    /// # Errors
    ///
    /// Propagates write and read failures.
    pub async fn round_trip(&mut self, parts: &[Vec<u8>], tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        let Some((last, literals)) = parts.split_last() else {
            return Ok(responses);
        };
        for part in literals {
            self.write_command(part).await?;
            if !self.read_continuation(tag, &mut responses).await? {
                return Ok(responses);
            }
        }
        self.write_command(last).await?;
        responses.extend(self.read_until_tagged(tag).await?);
        Ok(responses)
    }

    /// Waits for the server to accept a literal.
    ///
    /// Responses read on the way are appended to `responses`. Returns
    /// `false` when the completion for `tag` arrives instead of a
    /// continuation request, which means the server refused the command.
    ///
    /// # Errors
    ///
    /// Propagates any [`read_response`](Self::read_response) failure.
    pub async fn read_continuation(
        &mut self,
        tag: &str,
        responses: &mut Vec<Vec<u8>>,
    ) -> Result<bool> {
        loop {
            let response = self.read_response().await?;
            if response.starts_with(b"+") {
                return Ok(true);
            }
            let done = is_tagged(&response, tag);
            responses.push(response);
            if done {
                return Ok(false);
            }
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                return Ok(line);
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Writes a serialized command and flushes it.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Buffered but unread bytes are dropped, which is what STARTTLS needs.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

fn is_tagged(response: &[u8], tag: &str) -> bool {
    response
        .strip_prefix(tag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

/// Parses a trailing `{123}` or `{123+}` literal announcement.
fn literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n").or_else(|| line.strip_suffix(b"\n"))?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length(b"BODY {123}\r\n"), Some(123));
        assert_eq!(literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(literal_length(b"no literal\r\n"), None);
        assert_eq!(literal_length(b"incomplete {123"), None);
        assert_eq!(literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(literal_length(b"empty {}\r\n"), None);
    }

    #[test]
    fn test_is_tagged() {
        assert!(is_tagged(b"A0001 OK done\r\n", "A0001"));
        assert!(!is_tagged(b"A00011 OK done\r\n", "A0001"));
        assert!(!is_tagged(b"* OK untagged\r\n", "A0001"));
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_read_line_split_across_reads() {
        let mock = Builder::new().read(b"* 3 EXI").read(b"STS\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* 3 EXISTS\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {5}\r\n")
            .read(b"hello)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* 1 FETCH (BODY[] {5}\r\nhello)\r\n");
    }

    #[tokio::test]
    async fn test_literal_containing_crlf() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {9}\r\nFrom: a\r\n)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* 1 FETCH (BODY[] {9}\r\nFrom: a\r\n)\r\n");
    }

    #[tokio::test]
    async fn test_read_until_tagged() {
        let mock = Builder::new()
            .read(b"* 2 EXISTS\r\n")
            .read(b"* OK [UIDNEXT 9] next\r\n")
            .read(b"A0001 OK SELECT done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let responses = framed.read_until_tagged("A0001").await.unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2], b"A0001 OK SELECT done\r\n");
    }

    #[tokio::test]
    async fn test_read_continuation() {
        let mock = Builder::new()
            .read(b"* OK still there\r\n")
            .read(b"+ Ready for literal\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let mut seen = Vec::new();
        assert!(framed.read_continuation("A0001", &mut seen).await.unwrap());
        assert_eq!(seen, [b"* OK still there\r\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_literal_refused() {
        let mock = Builder::new().read(b"A0001 BAD no literals\r\n").build();
        let mut framed = FramedStream::new(mock);

        let mut seen = Vec::new();
        assert!(!framed.read_continuation("A0001", &mut seen).await.unwrap());
        assert_eq!(seen.len(), 1);
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"A0001 NOOP\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_is_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }
}
