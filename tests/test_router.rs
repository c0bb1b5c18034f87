use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tcphttp::http::request::{Method, Request};
use tcphttp::http::response::StatusCode;
use tcphttp::http::writer::{ResponseWriter, Sink, WriterState};
use tcphttp::routing::{compose, handler_fn, HandlerRef, MiddlewareRef, RouteError, Router};
use tokio::io::AsyncReadExt;

fn noop<'a>(_w: &'a mut ResponseWriter, _req: &'a Request) -> BoxFuture<'a, ()> {
    Box::pin(async {})
}

/// A handler that responds with `body`, so tests can tell handlers apart.
fn replying(body: &'static str) -> HandlerRef {
    handler_fn(move |w, _req| {
        Box::pin(async move {
            let headers = w.default_headers(body.len());
            w.respond(StatusCode::Ok, headers, body.as_bytes()).await.unwrap();
        })
    })
}

/// Runs `handler` against a writer that discards output.
async fn run(handler: &HandlerRef, req: &Request) -> WriterState {
    let mut writer = ResponseWriter::new(Box::new(tokio::io::sink()) as Sink);
    handler.call(&mut writer, req).await;
    writer.state()
}

/// Runs `handler` and returns the body it wrote.
async fn body_of(handler: &HandlerRef) -> String {
    let (tx, mut rx) = tokio::io::duplex(4096);
    let mut writer = ResponseWriter::new(Box::new(tx) as Sink);
    handler.call(&mut writer, &Request::default()).await;
    writer.flush().await.unwrap();
    drop(writer);

    let mut out = String::new();
    rx.read_to_string(&mut out).await.unwrap();
    match out.split_once("\r\n\r\n") {
        Some((_, body)) => body.to_string(),
        None => String::new(),
    }
}

#[test]
fn test_router_static_match() {
    let mut router = Router::new();
    router.get("/hello", handler_fn(noop)).unwrap();

    let matched = router.match_route("/hello", "GET").unwrap();
    assert!(matched.path_vars.is_empty());
    assert!(matched.middleware.is_empty());

    assert!(router.match_route("/hello/", "GET").is_ok());
    assert_eq!(
        router.match_route("/goodbye", "GET").err(),
        Some(RouteError::NotFound)
    );
}

#[test]
fn test_router_captures_path_vars() {
    let mut router = Router::new();
    router.get("/users/{id}", handler_fn(noop)).unwrap();
    router
        .get("/orgs/{org}/repos/{repo}", handler_fn(noop))
        .unwrap();

    let matched = router.match_route("/users/42", "GET").unwrap();
    assert_eq!(matched.path_vars["id"], "42");

    let matched = router.match_route("/orgs/acme/repos/widgets", "GET").unwrap();
    assert_eq!(matched.path_vars["org"], "acme");
    assert_eq!(matched.path_vars["repo"], "widgets");

    assert_eq!(
        router.match_route("/users/42/extra", "GET").err(),
        Some(RouteError::NotFound)
    );
}

#[test]
fn test_router_method_not_allowed() {
    let mut router = Router::new();
    router.get("/items", handler_fn(noop)).unwrap();

    assert_eq!(
        router.match_route("/items", "POST").err(),
        Some(RouteError::MethodNotAllowed)
    );
    assert_eq!(
        router.match_route("/items", "BREW").err(),
        Some(RouteError::MethodNotAllowed)
    );
}

#[test]
fn test_router_any_method_route() {
    let mut router = Router::new();
    router.route("/any", handler_fn(noop)).unwrap();

    for method in ["GET", "POST", "DELETE", "BREW"] {
        assert!(router.match_route("/any", method).is_ok(), "{method}");
    }
}

#[test]
fn test_router_methods_share_one_entry() {
    let mut router = Router::new();
    router.get("/items", handler_fn(noop)).unwrap();
    router.post("/items", handler_fn(noop)).unwrap();
    router.on(Method::DELETE, "/items", handler_fn(noop)).unwrap();

    assert_eq!(router.len(), 1);
    assert!(router.match_route("/items", "DELETE").is_ok());
}

#[tokio::test]
async fn test_router_method_shortcuts() {
    let mut router = Router::new();
    let route = router.put("/items/{id}", replying("put")).unwrap();
    assert_eq!(route.pattern(), "/items/{id}");
    router.patch("/items/{id}", replying("patch")).unwrap();
    router.delete("/items/{id}", replying("delete")).unwrap();

    for (method, expected) in [("PUT", "put"), ("PATCH", "patch"), ("DELETE", "delete")] {
        let matched = router.match_route("/items/9", method).unwrap();
        assert_eq!(matched.path_vars["id"], "9");
        assert_eq!(body_of(&matched.handler).await, expected, "{method}");
    }
    assert_eq!(
        router.match_route("/items/9", "GET").err(),
        Some(RouteError::MethodNotAllowed)
    );
}

#[tokio::test]
async fn test_router_static_wins_over_dynamic() {
    let mut router = Router::new();
    router.get("/users/{id}", replying("dynamic")).unwrap();
    router.get("/users/me", replying("static")).unwrap();

    let me = router.match_route("/users/me", "GET").unwrap();
    assert!(me.path_vars.is_empty());
    assert_eq!(body_of(&me.handler).await, "static");

    let other = router.match_route("/users/7", "GET").unwrap();
    assert_eq!(body_of(&other.handler).await, "dynamic");
}

#[test]
fn test_router_rejects_invalid_patterns() {
    let mut router = Router::new();

    assert!(router.get("users", handler_fn(noop)).is_err());
    assert!(router.get("/users/{}", handler_fn(noop)).is_err());
    assert!(router.is_empty());
}

#[test]
fn test_route_middleware_is_returned_with_match() {
    let mut router = Router::new();
    router
        .get("/guarded", handler_fn(noop))
        .unwrap()
        .middleware(|next: HandlerRef| next);

    let matched = router.match_route("/guarded", "GET").unwrap();
    assert_eq!(matched.middleware.len(), 1);
}

fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> MiddlewareRef {
    let log = Arc::clone(log);
    Arc::new(move |next: HandlerRef| -> HandlerRef {
        let log = Arc::clone(&log);
        handler_fn(move |w, req| {
            let next = next.clone();
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(format!("{name} before"));
                next.call(w, req).await;
                log.lock().unwrap().push(format!("{name} after"));
            })
        })
    })
}

#[tokio::test]
async fn test_compose_orders_global_then_route() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let global = vec![recording(&log, "g1"), recording(&log, "g2")];
    let route = vec![recording(&log, "r1")];

    let terminal_log = Arc::clone(&log);
    let terminal = handler_fn(move |_w, _req| {
        let log = Arc::clone(&terminal_log);
        Box::pin(async move {
            log.lock().unwrap().push("handler".to_string());
        })
    });

    let chain = compose(&global, &route, terminal);
    let state = run(&chain, &Request::default()).await;
    assert_eq!(state, WriterState::NotStarted);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "g1 before",
            "g2 before",
            "r1 before",
            "handler",
            "r1 after",
            "g2 after",
            "g1 after",
        ]
    );
}

#[tokio::test]
async fn test_compose_short_circuit() {
    let called = Arc::new(Mutex::new(false));
    let called_in_handler = Arc::clone(&called);
    let terminal = handler_fn(move |_w, _req| {
        let called = Arc::clone(&called_in_handler);
        Box::pin(async move {
            *called.lock().unwrap() = true;
        })
    });

    let deny: MiddlewareRef = Arc::new(|_next: HandlerRef| -> HandlerRef { replying("denied") });

    let chain = compose(&[deny], &[], terminal);

    assert_eq!(body_of(&chain).await, "denied");
    assert!(!*called.lock().unwrap());
}

#[test]
fn test_compose_without_middleware_is_terminal() {
    let terminal = handler_fn(noop);
    let chain = compose(&[], &[], Arc::clone(&terminal));

    assert!(Arc::ptr_eq(&chain, &terminal));
}
