use thiserror::Error;

use crate::http::headers::find_crlf;
use crate::http::request::{parse_query, Request};

/// Protocol errors. Each one is fatal for the request it occurred in.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("bad start line")]
    BadStartLine,

    #[error("invalid header line")]
    InvalidHeaderLine,

    #[error("invalid content-length header")]
    InvalidContentLength,

    #[error("content length and body length mismatch: expected {expected}, got {actual}")]
    BodyLengthMismatch { expected: usize, actual: usize },

    #[error("request exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Initialised,
    ParsingHeaders,
    ParsingBody,
    Done,
}

/// Incremental request parser.
///
/// Feed it the bytes buffered so far; it reports how many it consumed and
/// whether the request is complete. Unconsumed bytes must be kept by the
/// caller and passed again, followed by whatever arrives next.
///
/// ```
/// # use tcphttp::http::parser::RequestParser;
/// let mut parser = RequestParser::new();
/// let (n, done) = parser.parse(b"GET / HTTP/1.1\r\n").unwrap();
/// assert_eq!((n, done), (16, false));
/// let (_, done) = parser.parse(b"\r\n").unwrap();
/// assert!(done);
/// ```
#[derive(Debug)]
pub struct RequestParser {
    state: ParserState,
    request: Request,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Initialised,
            request: Request::default(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    /// Advances through as many states as `buf` allows.
    ///
    /// Returns the bytes consumed from the front of `buf` and whether the
    /// request is complete. Calling again once complete is a no-op.
    pub fn parse(&mut self, buf: &[u8]) -> Result<(usize, bool), ParseError> {
        let mut read = 0;

        loop {
            match self.state {
                ParserState::Initialised => {
                    let n = self.parse_request_line(&buf[read..])?;
                    if n == 0 {
                        break;
                    }
                    read += n;
                    self.state = ParserState::ParsingHeaders;
                }

                ParserState::ParsingHeaders => {
                    let (n, done) = self.request.headers.parse_line(&buf[read..])?;
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if done {
                        self.state = ParserState::ParsingBody;
                    }
                }

                ParserState::ParsingBody => {
                    let Some(n) = self.parse_body(&buf[read..])? else {
                        break;
                    };
                    read += n;
                    self.state = ParserState::Done;
                }

                ParserState::Done => break,
            }
        }

        Ok((read, self.is_done()))
    }

    /// Checks what is left once the stream has ended.
    ///
    /// A body cut short by the peer is reported as a length mismatch. Any
    /// other unfinished state is a plain disconnect and not an error.
    pub fn finish(&self, buffered: &[u8]) -> Result<(), ParseError> {
        if self.state != ParserState::ParsingBody {
            return Ok(());
        }

        match self.request.headers.has_content_length() {
            Some(expected) if buffered.len() < expected => Err(ParseError::BodyLengthMismatch {
                expected,
                actual: buffered.len(),
            }),
            _ => Ok(()),
        }
    }

    /// The parsed request, once complete.
    pub fn into_request(self) -> Option<Request> {
        self.is_done().then_some(self.request)
    }

    fn parse_request_line(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let Some(end) = find_crlf(buf) else {
            return Ok(0);
        };

        let line = std::str::from_utf8(&buf[..end]).map_err(|_| ParseError::BadStartLine)?;
        let parts: Vec<&str> = line.split(' ').collect();
        let [method, target, version] = parts.as_slice() else {
            return Err(ParseError::BadStartLine);
        };

        if !method.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ParseError::BadStartLine);
        }

        let version = match *version {
            "HTTP/1.1" => "1.1",
            "HTTP/1.0" => "1.0",
            _ => return Err(ParseError::BadStartLine),
        };

        self.request.method = method.to_string();
        self.request.target = target.to_string();
        self.request.version = version.to_string();
        self.request.query_params = parse_query(target);

        Ok(end + 2)
    }

    /// `None` means more bytes are needed.
    fn parse_body(&mut self, buf: &[u8]) -> Result<Option<usize>, ParseError> {
        if !self.request.headers.contains("content-length") {
            return Ok(Some(0));
        }

        let expected = self
            .request
            .headers
            .get("content-length")
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidContentLength)?;

        if buf.len() < expected {
            return Ok(None);
        }

        self.request.body = buf[..expected].to_vec();
        Ok(Some(expected))
    }
}
