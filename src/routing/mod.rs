//! Request routing.
//!
//! Handlers are registered on a [`Router`] by path pattern and method, and
//! can be wrapped by [`Middleware`]. The route table is built before the
//! server starts and shared read-only by every connection.

pub mod handler;
pub mod middleware;
pub mod router;
pub mod routes;

pub use handler::{handler_fn, Handler, HandlerRef};
pub use middleware::{compose, Middleware, MiddlewareRef};
pub use router::{InvalidPattern, Route, RouteError, RouteMatch, Router};
pub use routes::Routes;
