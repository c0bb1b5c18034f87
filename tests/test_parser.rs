use tcphttp::http::parser::{ParseError, ParserState, RequestParser};
use tcphttp::http::request::Request;

fn parse_all(bytes: &[u8]) -> Result<(Request, usize), ParseError> {
    let mut parser = RequestParser::new();
    let (consumed, done) = parser.parse(bytes)?;
    assert!(done, "request should be complete");
    Ok((parser.into_request().unwrap(), consumed))
}

/// Feeds `bytes` in pieces of `chunk` bytes, keeping unconsumed bytes
/// buffered the way a connection does.
fn parse_in_chunks(bytes: &[u8], chunk: usize) -> Result<Request, ParseError> {
    let mut parser = RequestParser::new();
    let mut buffer: Vec<u8> = Vec::new();

    for piece in bytes.chunks(chunk) {
        buffer.extend_from_slice(piece);
        let (consumed, done) = parser.parse(&buffer)?;
        buffer.drain(..consumed);
        if done {
            return Ok(parser.into_request().unwrap());
        }
    }

    panic!("request never completed, parser state {:?}", parser.state());
}

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_all(req).unwrap();

    assert_eq!(parsed.method, "GET");
    assert_eq!(parsed.target, "/");
    assert_eq!(parsed.version, "1.1");
    assert_eq!(parsed.headers.get("Host"), "example.com");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_all(req).unwrap();

    assert_eq!(parsed.method, "POST");
    assert_eq!(parsed.target, "/api");
    assert_eq!(parsed.body, b"hello".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_multiple_headers() {
    let req = b"GET /path HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test-client\r\nAccept: */*\r\n\r\n";
    let (parsed, _) = parse_all(req).unwrap();

    assert_eq!(parsed.headers.get("host"), "example.com");
    assert_eq!(parsed.headers.get("user-agent"), "test-client");
    assert_eq!(parsed.headers.get("accept"), "*/*");
}

#[test]
fn test_parse_request_with_query_string() {
    let req = b"GET /search?q=rust+lang&page=2&page=3&tag=a%26b HTTP/1.1\r\n\r\n";
    let (parsed, _) = parse_all(req).unwrap();

    assert_eq!(parsed.target, "/search?q=rust+lang&page=2&page=3&tag=a%26b");
    assert_eq!(parsed.path(), "/search");
    assert_eq!(parsed.query_params["q"], "rust lang");
    assert_eq!(parsed.query_params["page"], "3");
    assert_eq!(parsed.query_params["tag"], "a&b");
}

#[test]
fn test_parse_http10_version() {
    let (parsed, _) = parse_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
    assert_eq!(parsed.version, "1.0");
}

#[test]
fn test_parse_incomplete_request_line_consumes_nothing() {
    let mut parser = RequestParser::new();

    assert_eq!(parser.parse(b"GET / HTTP/1.1").unwrap(), (0, false));
    assert_eq!(parser.state(), ParserState::Initialised);
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let mut parser = RequestParser::new();
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";

    let (consumed, done) = parser.parse(req).unwrap();

    assert_eq!(consumed, req.len());
    assert!(!done);
    assert_eq!(parser.state(), ParserState::ParsingHeaders);
}

#[test]
fn test_parse_partial_body_waits_for_more_bytes() {
    let mut parser = RequestParser::new();
    let head = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\n";
    let mut buffer = head.to_vec();
    buffer.extend_from_slice(b"hello");

    let (consumed, done) = parser.parse(&buffer).unwrap();
    assert_eq!(consumed, head.len());
    assert!(!done);
    assert_eq!(parser.state(), ParserState::ParsingBody);

    let (consumed, done) = parser.parse(b"helloworld").unwrap();
    assert_eq!((consumed, done), (10, true));
    assert_eq!(parser.into_request().unwrap().body, b"helloworld".to_vec());
}

#[test]
fn test_parse_leaves_bytes_after_body() {
    let req = b"POST /a HTTP/1.1\r\nContent-Length: 2\r\n\r\nokGET /b HTTP/1.1\r\n\r\n";
    let mut parser = RequestParser::new();

    let (consumed, done) = parser.parse(req).unwrap();

    assert!(done);
    assert_eq!(&req[consumed..], b"GET /b HTTP/1.1\r\n\r\n");
}

#[test]
fn test_finish_reports_truncated_body() {
    let mut parser = RequestParser::new();
    parser
        .parse(b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\n")
        .unwrap();

    assert_eq!(
        parser.finish(b"123456789"),
        Err(ParseError::BodyLengthMismatch {
            expected: 10,
            actual: 9
        })
    );
}

#[test]
fn test_finish_before_body_is_not_an_error() {
    let mut parser = RequestParser::new();
    parser.parse(b"GET / HTTP/1.1\r\nHost: x\r\n").unwrap();

    assert_eq!(parser.finish(b""), Ok(()));
}

#[test]
fn test_parse_start_line_token_count() {
    for line in [
        "GET /\r\n\r\n",
        "GET / HTTP/1.1 extra\r\n\r\n",
        "GET  / HTTP/1.1\r\n\r\n",
        "\r\n\r\n",
    ] {
        let mut parser = RequestParser::new();
        assert_eq!(
            parser.parse(line.as_bytes()),
            Err(ParseError::BadStartLine),
            "{line:?}"
        );
        assert!(parser.into_request().is_none());
    }
}

#[test]
fn test_parse_rejects_bad_version_and_method() {
    for line in [
        "GET / HTTP/2.0\r\n\r\n",
        "GET / http/1.1\r\n\r\n",
        "get / HTTP/1.1\r\n\r\n",
    ] {
        let mut parser = RequestParser::new();
        assert_eq!(parser.parse(line.as_bytes()), Err(ParseError::BadStartLine));
    }
}

#[test]
fn test_parse_malformed_header() {
    let mut parser = RequestParser::new();
    let result = parser.parse(b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n");

    assert_eq!(result, Err(ParseError::InvalidHeaderLine));
}

#[test]
fn test_parse_invalid_content_length() {
    let mut parser = RequestParser::new();
    let result = parser.parse(b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n");

    assert_eq!(result, Err(ParseError::InvalidContentLength));
}

#[test]
fn test_parse_chunked_request_has_empty_body() {
    let req = b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
    let (parsed, consumed) = parse_all(req).unwrap();

    assert!(parsed.body.is_empty());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_request_with_binary_body() {
    let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03";
    let (parsed, _) = parse_all(req).unwrap();

    assert_eq!(parsed.body, vec![0, 1, 2, 3]);
}

#[test]
fn test_parse_request_with_empty_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
    let (parsed, _) = parse_all(req).unwrap();

    assert_eq!(parsed.body.len(), 0);
}

#[test]
fn test_chunk_size_independence() {
    let req: &[u8] = b"PATCH /users/7?fields=name&x=1 HTTP/1.1\r\n\
        Host: example.com\r\n\
        X-Trace: a\r\n\
        x-trace: b\r\n\
        Content-Length: 11\r\n\
        \r\n\
        hello world";

    let (whole, _) = parse_all(req).unwrap();
    assert_eq!(whole.headers.get("x-trace"), "a, b");

    for chunk in [1, 2, 3, 7, 16, req.len()] {
        assert_eq!(parse_in_chunks(req, chunk).unwrap(), whole, "chunk size {chunk}");
    }
}

#[test]
fn test_parse_in_done_state_is_noop() {
    let mut parser = RequestParser::new();
    parser.parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();

    assert_eq!(parser.parse(b"anything at all").unwrap(), (0, true));
    assert_eq!(parser.state(), ParserState::Done);
}
