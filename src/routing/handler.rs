use std::sync::Arc;

use futures::future::BoxFuture;

use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

/// Produces the response for a request.
///
/// A handler is expected to finish exactly one response on the writer,
/// either with [`ResponseWriter::respond`] or with the manual status line,
/// headers and body sequence. Any function or closure with the matching
/// signature is a handler:
///
/// ```
/// use futures::future::BoxFuture;
/// use tcphttp::http::request::Request;
/// use tcphttp::http::response::StatusCode;
/// use tcphttp::http::writer::ResponseWriter;
///
/// fn hello<'a>(w: &'a mut ResponseWriter, _req: &'a Request) -> BoxFuture<'a, ()> {
///     Box::pin(async move {
///         let headers = w.default_headers(0);
///         let _ = w.respond(StatusCode::Ok, headers, b"hello").await;
///     })
/// }
/// # let _ = tcphttp::routing::handler_fn(hello);
/// ```
pub trait Handler: Send + Sync {
    fn call<'a>(&'a self, writer: &'a mut ResponseWriter, request: &'a Request) -> BoxFuture<'a, ()>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut ResponseWriter, &'a Request) -> BoxFuture<'a, ()> + Send + Sync,
{
    fn call<'a>(&'a self, writer: &'a mut ResponseWriter, request: &'a Request) -> BoxFuture<'a, ()> {
        (self)(writer, request)
    }
}

pub type HandlerRef = Arc<dyn Handler>;

/// Boxes a function or closure into a shareable handler.
pub fn handler_fn<F>(f: F) -> HandlerRef
where
    F: for<'a> Fn(&'a mut ResponseWriter, &'a Request) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}
