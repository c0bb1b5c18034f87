use std::sync::Arc;

use crate::routing::handler::HandlerRef;

/// Wraps a handler in another one.
///
/// The wrapper decides whether and when to call `next`; not calling it
/// short-circuits the chain.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: HandlerRef) -> HandlerRef;
}

impl<F> Middleware for F
where
    F: Fn(HandlerRef) -> HandlerRef + Send + Sync,
{
    fn wrap(&self, next: HandlerRef) -> HandlerRef {
        (self)(next)
    }
}

pub type MiddlewareRef = Arc<dyn Middleware>;

/// Builds the chain for one dispatch.
///
/// Global middlewares wrap route middlewares, which wrap `terminal`. Within
/// each list the first registered is the outermost.
pub fn compose(global: &[MiddlewareRef], route: &[MiddlewareRef], terminal: HandlerRef) -> HandlerRef {
    global
        .iter()
        .chain(route)
        .rev()
        .fold(terminal, |next, middleware| middleware.wrap(next))
}
