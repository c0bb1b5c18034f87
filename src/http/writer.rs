use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::Headers;
use crate::http::response::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Write half of a connection as seen by handlers.
pub type Sink = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriterState {
    NotStarted,
    StatusLineWritten,
    HeadersWritten,
    BodyWritten,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("writes executed in the wrong order: current {current:?}, expected {expected:?}")]
    OutOfOrder {
        current: WriterState,
        expected: WriterState,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Writes one response in order: status line, headers, then a body.
///
/// The body is either a single [`write_body`](Self::write_body) or a series
/// of [`write_chunked_body`](Self::write_chunked_body) calls closed by
/// [`write_chunked_body_done`](Self::write_chunked_body_done). A call made in
/// the wrong state fails with [`WriteError::OutOfOrder`] before anything is
/// written.
pub struct ResponseWriter<W = Sink> {
    sink: W,
    state: WriterState,
    keep_alive: bool,
    write_timeout: Option<Duration>,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: WriterState::NotStarted,
            keep_alive: true,
            write_timeout: None,
        }
    }

    /// Sets the `connection` value used by [`default_headers`](Self::default_headers).
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Bounds every individual write. An elapsed write fails with
    /// [`io::ErrorKind::TimedOut`].
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Minimal header set for a plain-text body of `content_length` bytes.
    pub fn default_headers(&self, content_length: usize) -> Headers {
        default_headers(content_length, self.keep_alive)
    }

    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), WriteError> {
        self.expect_state(WriterState::NotStarted)?;

        let line = format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        );
        self.write_raw(line.as_bytes()).await?;

        self.state = WriterState::StatusLineWritten;
        Ok(())
    }

    /// Writes the header block.
    ///
    /// An empty set is replaced by [`default_headers(0)`](Self::default_headers).
    /// The blank line closing the block is only written when the headers
    /// declare a body length (or chunked encoding).
    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), WriteError> {
        self.expect_state(WriterState::StatusLineWritten)?;

        let defaults;
        let headers = if headers.is_empty() {
            defaults = self.default_headers(0);
            &defaults
        } else {
            headers
        };

        let mut buf = serialize_headers(headers);
        if headers.has_content_length().is_some() {
            buf.extend_from_slice(b"\r\n");
        }
        self.write_raw(&buf).await?;

        self.state = WriterState::HeadersWritten;
        Ok(())
    }

    pub async fn write_body(&mut self, body: &[u8]) -> Result<(), WriteError> {
        self.expect_state(WriterState::HeadersWritten)?;

        self.write_raw(body).await?;

        self.state = WriterState::BodyWritten;
        Ok(())
    }

    /// Writes a complete response in one go.
    ///
    /// `content-length` is always overwritten with the body length, and
    /// `content-type` becomes `text/html` when the body looks like an HTML
    /// document.
    pub async fn respond(
        &mut self,
        status: StatusCode,
        mut headers: Headers,
        body: &[u8],
    ) -> Result<(), WriteError> {
        self.write_status_line(status).await?;

        headers.replace("content-length", &body.len().to_string());
        if is_html(body) {
            headers.replace("content-type", "text/html");
        }

        self.write_headers(&headers).await?;
        self.write_body(body).await
    }

    /// Writes one chunk. Empty chunks are skipped, since a zero-length chunk
    /// would end the body.
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<(), WriteError> {
        self.expect_state(WriterState::HeadersWritten)?;

        if chunk.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::with_capacity(chunk.len() + 12);
        buf.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        buf.extend_from_slice(chunk);
        buf.extend_from_slice(b"\r\n");
        self.write_raw(&buf).await?;
        self.flush().await
    }

    /// Ends a chunked body with the zero chunk, `trailers`, and the final blank line.
    pub async fn write_chunked_body_done(&mut self, trailers: &Headers) -> Result<(), WriteError> {
        self.expect_state(WriterState::HeadersWritten)?;

        let mut buf = b"0\r\n".to_vec();
        buf.extend_from_slice(&serialize_headers(trailers));
        buf.extend_from_slice(b"\r\n");
        self.write_raw(&buf).await?;

        self.state = WriterState::BodyWritten;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), WriteError> {
        match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, self.sink.flush())
                .await
                .map_err(|_| write_timed_out())??,
            None => self.sink.flush().await?,
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn expect_state(&self, expected: WriterState) -> Result<(), WriteError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WriteError::OutOfOrder {
                current: self.state,
                expected,
            })
        }
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, self.sink.write_all(bytes))
                .await
                .map_err(|_| write_timed_out())??,
            None => self.sink.write_all(bytes).await?,
        }
        Ok(())
    }
}

/// `content-length`, `connection` and a plain-text `content-type`.
pub fn default_headers(content_length: usize, keep_alive: bool) -> Headers {
    let mut headers = Headers::new();
    headers.set("content-length", &content_length.to_string());
    headers.set("connection", if keep_alive { "keep-alive" } else { "close" });
    headers.set("content-type", "text/plain");
    headers
}

fn serialize_headers(headers: &Headers) -> Vec<u8> {
    let mut buf = Vec::new();
    for (name, value) in headers.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.push(b':');
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

fn is_html(body: &[u8]) -> bool {
    contains(body, b"<html>") && contains(body, b"</html>")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn write_timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "write deadline elapsed")
}
