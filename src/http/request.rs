use std::collections::HashMap;
use std::fmt;

use crate::http::headers::Headers;

/// HTTP request methods a route can be registered for.
///
/// Requests themselves carry the method as the raw token from the request
/// line, so an unknown method still parses and can be answered with 405.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Arguments
    ///
    /// * `s` - String representation of the method (case-sensitive, typically uppercase)
    ///
    /// # Returns
    ///
    /// `Some(Method)` if the string matches a known method, `None` otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// # use tcphttp::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a parsed HTTP request from a client.
///
/// Built up field by field by the [`RequestParser`](crate::http::parser::RequestParser).
/// `path_vars` is empty until routing fills it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Method token from the request line (e.g. "GET")
    pub method: String,
    /// Request target, path plus optional query string (e.g. "/search?q=rust")
    pub target: String,
    /// Version number from the request line (e.g. "1.1")
    pub version: String,
    /// Request headers, names lower-cased
    pub headers: Headers,
    /// Exactly `content-length` bytes of body
    pub body: Vec<u8>,
    /// Named segments captured by a dynamic route
    pub path_vars: HashMap<String, String>,
    /// Decoded query string parameters, last duplicate wins
    pub query_params: HashMap<String, String>,
}

/// Builder for constructing Request objects.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<String>,
    target: Option<String>,
    version: Option<String>,
    headers: Headers,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method.as_str().to_string());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.set(key, value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let target = self.target.ok_or("target missing")?;
        let query_params = parse_query(&target);

        Ok(Request {
            method: self.method.ok_or("method missing")?,
            target,
            version: self.version.unwrap_or_else(|| "1.1".to_string()),
            headers: self.headers,
            body: self.body,
            path_vars: HashMap::new(),
            query_params,
        })
    }
}

impl Request {
    /// Retrieves a header value by name, case-insensitively.
    ///
    /// # Returns
    ///
    /// `Some(&str)` with the header value if present, `None` otherwise.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .contains(key)
            .then(|| self.headers.get(key))
    }

    /// The request target without its query string.
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map(|(path, _)| path)
            .unwrap_or(&self.target)
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.headers.get("content-length").parse().unwrap_or(0)
    }

    /// Whether the client asked for the connection to be closed after this
    /// response (`Connection: close`). Connections persist otherwise.
    pub fn should_close(&self) -> bool {
        self.headers.get("connection").eq_ignore_ascii_case("close")
    }
}

/// Decodes the query string of `target` into a map.
///
/// Pairs are form-urlencoded (`+` is a space). When a key repeats, the last
/// value wins.
pub fn parse_query(target: &str) -> HashMap<String, String> {
    let Some((_, query)) = target.split_once('?') else {
        return HashMap::new();
    };

    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
