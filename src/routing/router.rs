use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::http::request::Method;
use crate::routing::handler::HandlerRef;
use crate::routing::middleware::{Middleware, MiddlewareRef};

/// Why a request could not be routed. Both outcomes are answered with a
/// normal response rather than treated as failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    #[error("no route match found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid route pattern {0:?}: must start with '/' and name every {{}} segment")]
pub struct InvalidPattern(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Var(String),
}

/// One registered pattern with its handlers and route-specific middleware.
pub struct Route {
    pattern: String,
    segments: Vec<Segment>,
    any: Option<HandlerRef>,
    methods: HashMap<Method, HandlerRef>,
    middleware: Vec<MiddlewareRef>,
}

/// A successful lookup.
pub struct RouteMatch<'r> {
    pub handler: HandlerRef,
    pub middleware: &'r [MiddlewareRef],
    pub path_vars: HashMap<String, String>,
}

/// Route table keyed by path pattern.
///
/// Patterns are `/`-separated; a `{name}` segment matches any single path
/// segment and captures it as a path variable. Static patterns are tried
/// before dynamic ones, and dynamic ones in registration order.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Route {
    fn parse(pattern: &str) -> Result<Self, InvalidPattern> {
        if !pattern.starts_with('/') {
            return Err(InvalidPattern(pattern.to_string()));
        }

        let segments = split_path(pattern)
            .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some("") => Err(InvalidPattern(pattern.to_string())),
                Some(name) => Ok(Segment::Var(name.to_string())),
                None => Ok(Segment::Static(segment.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            any: None,
            methods: HashMap::new(),
            middleware: Vec::new(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Adds middleware that only runs for this route, inside the global ones.
    pub fn middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    fn is_dynamic(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Var(_)))
    }

    fn capture(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut vars = HashMap::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Static(expected) if expected.as_str() == *actual => {}
                Segment::Static(_) => return None,
                Segment::Var(name) => {
                    vars.insert(name.clone(), actual.to_string());
                }
            }
        }
        Some(vars)
    }

    fn handler_for(&self, method: &str) -> Option<&HandlerRef> {
        Method::from_str(method)
            .and_then(|m| self.methods.get(&m))
            .or(self.any.as_ref())
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every method on `pattern`.
    pub fn route(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Route, InvalidPattern> {
        let route = self.entry(pattern)?;
        route.any = Some(handler);
        Ok(route)
    }

    pub fn on(
        &mut self,
        method: Method,
        pattern: &str,
        handler: HandlerRef,
    ) -> Result<&mut Route, InvalidPattern> {
        let route = self.entry(pattern)?;
        route.methods.insert(method, handler);
        Ok(route)
    }

    pub fn get(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Route, InvalidPattern> {
        self.on(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Route, InvalidPattern> {
        self.on(Method::POST, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Route, InvalidPattern> {
        self.on(Method::PUT, pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Route, InvalidPattern> {
        self.on(Method::PATCH, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Route, InvalidPattern> {
        self.on(Method::DELETE, pattern, handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Looks up the handler for `path` (no query string) and `method`.
    pub fn match_route(&self, path: &str, method: &str) -> Result<RouteMatch<'_>, RouteError> {
        let segments: Vec<&str> = split_path(path).collect();
        let statics = self.routes.iter().filter(|r| !r.is_dynamic());
        let dynamics = self.routes.iter().filter(|r| r.is_dynamic());

        let mut path_matched = false;
        for route in statics.chain(dynamics) {
            let Some(path_vars) = route.capture(&segments) else {
                continue;
            };
            path_matched = true;

            if let Some(handler) = route.handler_for(method) {
                return Ok(RouteMatch {
                    handler: Arc::clone(handler),
                    middleware: &route.middleware,
                    path_vars,
                });
            }
        }

        if path_matched {
            Err(RouteError::MethodNotAllowed)
        } else {
            Err(RouteError::NotFound)
        }
    }

    fn entry(&mut self, pattern: &str) -> Result<&mut Route, InvalidPattern> {
        match self.routes.iter().position(|r| r.pattern == pattern) {
            Some(i) => Ok(&mut self.routes[i]),
            None => {
                self.routes.push(Route::parse(pattern)?);
                let last = self.routes.len() - 1;
                Ok(&mut self.routes[last])
            }
        }
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/')
}
