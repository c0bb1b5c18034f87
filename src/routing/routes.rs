use std::sync::Arc;

use futures::future::BoxFuture;

use crate::http::request::Request;
use crate::http::response::{StatusCode, METHOD_NOT_ALLOWED_PAGE, NOT_FOUND_PAGE};
use crate::http::writer::ResponseWriter;
use crate::routing::handler::{handler_fn, HandlerRef};
use crate::routing::middleware::{Middleware, MiddlewareRef};
use crate::routing::router::Router;

/// Everything a connection needs to dispatch a request.
///
/// Assembled during startup and then shared behind an `Arc`; sessions only
/// ever read it.
pub struct Routes {
    pub router: Router,
    pub middleware: Vec<MiddlewareRef>,
    pub not_found: HandlerRef,
    pub method_not_allowed: HandlerRef,
}

impl Default for Routes {
    fn default() -> Self {
        Self::new(Router::new())
    }
}

impl Routes {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            middleware: Vec::new(),
            not_found: handler_fn(not_found),
            method_not_allowed: handler_fn(method_not_allowed),
        }
    }

    /// Appends a global middleware. The first one added runs outermost.
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn with_not_found(mut self, handler: HandlerRef) -> Self {
        self.not_found = handler;
        self
    }
}

fn not_found<'a>(w: &'a mut ResponseWriter, req: &'a Request) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let headers = w.default_headers(NOT_FOUND_PAGE.len());
        if let Err(e) = w.respond(StatusCode::NotFound, headers, NOT_FOUND_PAGE).await {
            tracing::debug!(error = %e, path = %req.path(), "Failed to write 404 response");
        }
    })
}

fn method_not_allowed<'a>(w: &'a mut ResponseWriter, req: &'a Request) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let headers = w.default_headers(METHOD_NOT_ALLOWED_PAGE.len());
        if let Err(e) = w
            .respond(StatusCode::MethodNotAllowed, headers, METHOD_NOT_ALLOWED_PAGE)
            .await
        {
            tracing::debug!(error = %e, method = %req.method, path = %req.path(), "Failed to write 405 response");
        }
    })
}
