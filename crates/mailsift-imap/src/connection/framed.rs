//! Line framing.
//!
//! A response is a CRLF-terminated line, except that a line ending in a
//! `{n}` literal marker continues with `n` raw bytes and then more line.
//! [`FramedStream::read_response`] returns one whole response, literals
//! included, ready for the parser.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

const READ_CHUNK: usize = 8 * 1024;

/// Longest line accepted outside of literals.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted. Metadata responses are far below this.
const MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Buffered reader/writer over an IMAP transport.
#[derive(Debug)]
pub struct FramedStream<S> {
    stream: S,
    buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Reads one complete response.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, when the peer closes mid-response, or
    /// when a line or literal exceeds the size limits.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        // Start of the current line segment (after the last literal), and
        // the offset up to which it has been searched for CRLF.
        let mut line_start = 0;
        let mut scanned = 0;
        loop {
            if let Some(end) = find_crlf(&self.buffer[scanned..]).map(|i| scanned + i + 2) {
                match literal_length(&self.buffer[line_start..end]) {
                    Some(len) if len > MAX_LITERAL_SIZE => {
                        return Err(Error::Protocol(format!(
                            "literal of {len} bytes exceeds {MAX_LITERAL_SIZE}"
                        )));
                    }
                    Some(len) => {
                        self.fill_to(end + len).await?;
                        line_start = end + len;
                        scanned = line_start;
                    }
                    None => {
                        let response = self.buffer.split_to(end);
                        return Ok(response.to_vec());
                    }
                }
                continue;
            }

            if self.buffer.len() - line_start > MAX_LINE_LENGTH {
                return Err(Error::Protocol("response line too long".to_string()));
            }
            // Keep a trailing CR in range so a CRLF split across reads is found.
            scanned = self.buffer.len().saturating_sub(1).max(scanned);
            self.read_more().await?;
        }
    }

    async fn fill_to(&mut self, len: usize) -> Result<()> {
        while self.buffer.len() < len {
            self.read_more().await?;
        }
        Ok(())
    }

    async fn read_more(&mut self) -> Result<()> {
        self.buffer.reserve(READ_CHUNK);
        if self.stream.read_buf(&mut self.buffer).await? == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        Ok(())
    }

    /// Writes and flushes raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Length of the literal announced at the end of `line`, if any.
fn literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
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
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn reads_simple_lines_in_order() {
        let mock = Builder::new().read(b"* OK ready\r\nA1 OK done\r\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
        assert_eq!(framed.read_response().await.unwrap(), b"A1 OK done\r\n");
    }

    #[tokio::test]
    async fn joins_lines_split_across_reads() {
        let mock = Builder::new().read(b"* SEARCH 1 2").read(b" 3\r").read(b"\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* SEARCH 1 2 3\r\n");
    }

    #[tokio::test]
    async fn includes_literal_bytes() {
        let mock = Builder::new()
            .read(b"* LIST () \"/\" {6}\r\n")
            .read(b"a\r\nb c")
            .read(b"\r\nA1 OK\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* LIST () \"/\" {6}\r\na\r\nb c\r\n"
        );
        assert_eq!(framed.read_response().await.unwrap(), b"A1 OK\r\n");
    }

    #[tokio::test]
    async fn eof_mid_line_is_an_error() {
        let mock = Builder::new().read(b"* OK trunc").build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(framed.read_response().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn oversized_literal_is_rejected() {
        let mock = Builder::new().read(b"* 1 FETCH (BODY[] {999999999999}\r\n").build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(framed.read_response().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn writes_are_flushed() {
        let mock = Builder::new().write(b"A1 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.write_all(b"A1 NOOP\r\n").await.unwrap();
    }

    #[test]
    fn literal_markers() {
        assert_eq!(literal_length(b"* X {12}\r\n"), Some(12));
        assert_eq!(literal_length(b"A1 LOGIN {5+}\r\n"), Some(5));
        assert_eq!(literal_length(b"* OK {not}\r\n"), None);
        assert_eq!(literal_length(b"* OK done\r\n"), None);
    }
}
