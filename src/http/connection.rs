use std::fmt;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::config::ServerConfig;
use crate::http::parser::{ParseError, RequestParser};
use crate::http::request::Request;
use crate::http::response::{StatusCode, INTERNAL_ERROR_PAGE};
use crate::http::writer::{ResponseWriter, Sink, WriteError, WriterState};
use crate::routing::{compose, HandlerRef, MiddlewareRef, RouteError, Routes};

/// Per-connection limits and deadlines.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
    pub keepalive_interval: Duration,
    pub write_timeout: Option<Duration>,
    pub max_request_bytes: usize,
    pub read_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for SessionConfig {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            idle_timeout: cfg.idle_timeout(),
            keepalive_interval: cfg.keepalive_interval(),
            write_timeout: cfg.write_timeout(),
            max_request_bytes: cfg.max_request_bytes,
            read_buffer_size: cfg.read_buffer_size,
        }
    }
}

/// Why a session ended.
#[derive(Debug)]
pub enum CloseReason {
    /// The peer closed its side between requests.
    EndOfStream,
    /// No complete request arrived before the idle deadline.
    IdleTimeout,
    /// Reading failed, usually a reset.
    ReadFailed(io::Error),
    /// A request line with an empty method or target.
    EmptyRequest,
    /// The client sent `Connection: close`.
    ClientClose,
    /// The request could not be parsed; an error line was sent.
    Protocol(ParseError),
    /// The handler left the response half written.
    IncompleteResponse(WriterState),
    HandlerPanicked,
    WriteFailed(WriteError),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::EndOfStream => f.write_str("end of stream"),
            CloseReason::IdleTimeout => f.write_str("idle timeout"),
            CloseReason::ReadFailed(e) => write!(f, "read failed: {e}"),
            CloseReason::EmptyRequest => f.write_str("empty request"),
            CloseReason::ClientClose => f.write_str("client requested close"),
            CloseReason::Protocol(e) => write!(f, "protocol error: {e}"),
            CloseReason::IncompleteResponse(state) => write!(f, "incomplete response ({state:?})"),
            CloseReason::HandlerPanicked => f.write_str("handler panicked"),
            CloseReason::WriteFailed(e) => write!(f, "write failed: {e}"),
        }
    }
}

enum SessionState {
    AwaitingRequest,
    Dispatching(Box<Request>),
    DecidingContinuation { should_close: bool },
}

enum ReadOutcome {
    Request(Box<Request>),
    Closed(CloseReason),
}

/// Drives one accepted connection from its first request to close.
///
/// Requests are handled strictly one after another: the next one is not
/// parsed until the previous response has been flushed. Bytes that arrive
/// early stay buffered for the next iteration.
pub struct ConnectionSession<S> {
    reader: ReadHalf<S>,
    sink: Sink,
    buffer: BytesMut,
    routes: Arc<Routes>,
    config: SessionConfig,
}

impl ConnectionSession<TcpStream> {
    /// Enables TCP keep-alive probing on `stream` before wrapping it.
    pub fn from_tcp(stream: TcpStream, routes: Arc<Routes>, config: SessionConfig) -> Self {
        if let Err(e) = configure_keepalive(&stream, config.keepalive_interval) {
            warn!(error = %e, "Failed to enable TCP keep-alive");
        }
        Self::new(stream, routes, config)
    }
}

impl<S> ConnectionSession<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(stream: S, routes: Arc<Routes>, config: SessionConfig) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader,
            sink: Box::new(BufWriter::new(writer)),
            buffer: BytesMut::with_capacity(config.read_buffer_size),
            routes,
            config,
        }
    }

    /// Serves requests until the connection should close, then closes it.
    pub async fn run(mut self) -> CloseReason {
        let mut state = SessionState::AwaitingRequest;

        let reason = loop {
            state = match state {
                SessionState::AwaitingRequest => match self.read_request().await {
                    Ok(ReadOutcome::Request(request)) => SessionState::Dispatching(request),
                    Ok(ReadOutcome::Closed(reason)) => break reason,
                    Err(e) => {
                        warn!(error = %e, "Rejecting malformed request");
                        self.reject(&e).await;
                        break CloseReason::Protocol(e);
                    }
                },

                SessionState::Dispatching(request) => {
                    let should_close = request.should_close();
                    if let Err(reason) = self.dispatch(*request, should_close).await {
                        break reason;
                    }
                    SessionState::DecidingContinuation { should_close }
                }

                SessionState::DecidingContinuation { should_close } => {
                    if should_close {
                        break CloseReason::ClientClose;
                    }
                    SessionState::AwaitingRequest
                }
            };
        };

        self.close().await;
        reason
    }

    /// Reads until one request is complete. The idle deadline covers the
    /// whole request, not each read.
    async fn read_request(&mut self) -> Result<ReadOutcome, ParseError> {
        let deadline = Instant::now() + self.config.idle_timeout;
        let limit = self.config.max_request_bytes;
        let mut parser = RequestParser::new();
        let mut consumed = 0;

        loop {
            let (n, done) = parser.parse(&self.buffer)?;
            self.buffer.advance(n);
            consumed += n;

            // once done, whatever is still buffered belongs to the next request
            let pending = if done { 0 } else { self.buffer.len() };
            if consumed + pending > limit {
                return Err(ParseError::TooLarge { limit });
            }
            if done {
                break;
            }

            self.buffer.reserve(self.config.read_buffer_size);
            match timeout_at(deadline, self.reader.read_buf(&mut self.buffer)).await {
                Err(_) => return Ok(ReadOutcome::Closed(CloseReason::IdleTimeout)),
                Ok(Err(e)) => return Ok(ReadOutcome::Closed(CloseReason::ReadFailed(e))),
                Ok(Ok(0)) => {
                    parser.finish(&self.buffer)?;
                    return Ok(ReadOutcome::Closed(CloseReason::EndOfStream));
                }
                Ok(Ok(_)) => {}
            }
        }

        let Some(request) = parser.into_request() else {
            return Ok(ReadOutcome::Closed(CloseReason::EmptyRequest));
        };

        if request.method.is_empty() || request.target.is_empty() {
            return Ok(ReadOutcome::Closed(CloseReason::EmptyRequest));
        }

        Ok(ReadOutcome::Request(Box::new(request)))
    }

    async fn dispatch(&mut self, mut request: Request, should_close: bool) -> Result<(), CloseReason> {
        let routes = Arc::clone(&self.routes);

        // route middleware, or None for the 404/405 handlers which run bare
        let (terminal, route_middleware): (HandlerRef, Option<&[MiddlewareRef]>) =
            match routes.router.match_route(request.path(), &request.method) {
                Ok(matched) => {
                    request.path_vars.extend(matched.path_vars);
                    (matched.handler, Some(matched.middleware))
                }
                Err(RouteError::MethodNotAllowed) => (Arc::clone(&routes.method_not_allowed), None),
                Err(RouteError::NotFound) => (Arc::clone(&routes.not_found), None),
            };

        debug!(method = %request.method, path = %request.path(), "Dispatching request");

        let sink = std::mem::replace(&mut self.sink, Box::new(tokio::io::sink()));
        let mut writer = ResponseWriter::new(sink)
            .with_keep_alive(!should_close)
            .with_write_timeout(self.config.write_timeout);

        // `wrap` and closure handlers can panic before any future exists
        let outcome = AssertUnwindSafe(async {
            let chain = match route_middleware {
                Some(route) => compose(&routes.middleware, route, terminal),
                None => terminal,
            };
            chain.call(&mut writer, &request).await
        })
        .catch_unwind()
        .await;

        let result = match (outcome, writer.state()) {
            (Ok(()), WriterState::BodyWritten) => Ok(()),
            (Ok(()), WriterState::NotStarted) => {
                error!(method = %request.method, path = %request.path(), "Handler returned without responding");
                respond_internal_error(&mut writer).await
            }
            (Ok(()), state) => {
                error!(method = %request.method, path = %request.path(), ?state, "Handler left response incomplete");
                Err(CloseReason::IncompleteResponse(state))
            }
            (Err(_), state) => {
                error!(method = %request.method, path = %request.path(), "Handler panicked");
                if state == WriterState::NotStarted {
                    // best effort, the connection closes either way
                    let _ = respond_internal_error(&mut writer).await;
                }
                Err(CloseReason::HandlerPanicked)
            }
        };

        let flushed = writer.flush().await;
        self.sink = writer.into_inner();

        result?;
        flushed.map_err(CloseReason::WriteFailed)
    }

    /// Sends the terse error line for a request that could not be parsed.
    /// This skips the response writer, so there are no headers.
    async fn reject(&mut self, err: &ParseError) {
        let status = match err {
            ParseError::TooLarge { .. } => StatusCode::PayloadTooLarge,
            _ => StatusCode::BadRequest,
        };
        let line = format!("HTTP/1.1 {} {}\r\n\r\n", status.as_u16(), err);

        let limit = self.config.write_timeout;
        let sink = &mut self.sink;
        let write = async move {
            sink.write_all(line.as_bytes()).await?;
            sink.flush().await
        };
        if let Err(e) = with_deadline(limit, write).await {
            debug!(error = %e, "Failed to send error line");
        }
    }

    async fn close(mut self) {
        if let Err(e) = with_deadline(self.config.write_timeout, self.sink.shutdown()).await {
            debug!(error = %e, "Error while shutting down connection");
        }
    }
}

async fn respond_internal_error(writer: &mut ResponseWriter) -> Result<(), CloseReason> {
    let headers = writer.default_headers(INTERNAL_ERROR_PAGE.len());
    writer
        .respond(StatusCode::InternalServerError, headers, INTERNAL_ERROR_PAGE)
        .await
        .map_err(CloseReason::WriteFailed)
}

async fn with_deadline<F>(limit: Option<Duration>, fut: F) -> io::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write deadline elapsed"))?,
        None => fut.await,
    }
}

/// Turns on TCP keep-alive probes, first probe after `interval` of silence.
pub fn configure_keepalive(stream: &TcpStream, interval: Duration) -> io::Result<()> {
    let keepalive = socket2::TcpKeepalive::new().with_time(interval);
    socket2::SockRef::from(stream).set_tcp_keepalive(&keepalive)
}
