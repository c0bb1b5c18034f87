use futures::future::BoxFuture;
use tcphttp::config::Config;
use tcphttp::http::request::Request;
use tcphttp::http::response::StatusCode;
use tcphttp::http::stream::{stream_chunked, DEFAULT_CHUNK_SIZE};
use tcphttp::http::writer::ResponseWriter;
use tcphttp::routing::{handler_fn, HandlerRef};
use tcphttp::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.log_level()?)
        .init();

    let mut server = Server::new(cfg.server.clone());

    server.use_middleware(|next: HandlerRef| -> HandlerRef {
        handler_fn(move |w, req| {
            let next = next.clone();
            Box::pin(async move {
                let started = std::time::Instant::now();
                next.call(w, req).await;
                tracing::info!(
                    method = %req.method,
                    path = %req.path(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Request handled"
                );
            })
        })
    });

    server.get("/hello", handler_fn(hello))?;
    server.post("/echo", handler_fn(echo))?;
    server.get("/users/{id}", handler_fn(user))?;
    server.get("/query", handler_fn(query))?;
    server.get("/stream", handler_fn(stream))?;

    let listening = server.bind().await?;

    tokio::select! {
        res = listening.serve() => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

async fn send_text(w: &mut ResponseWriter, status: StatusCode, body: &[u8]) {
    let headers = w.default_headers(body.len());
    if let Err(e) = w.respond(status, headers, body).await {
        tracing::warn!(error = %e, "Failed to write response");
    }
}

fn hello<'a>(w: &'a mut ResponseWriter, _req: &'a Request) -> BoxFuture<'a, ()> {
    Box::pin(send_text(w, StatusCode::Ok, b"Hello from tcphttp\n"))
}

fn echo<'a>(w: &'a mut ResponseWriter, req: &'a Request) -> BoxFuture<'a, ()> {
    Box::pin(send_text(w, StatusCode::Ok, &req.body))
}

fn user<'a>(w: &'a mut ResponseWriter, req: &'a Request) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let id = req.path_vars.get("id").map(String::as_str).unwrap_or_default();
        send_text(w, StatusCode::Ok, format!("user {id}\n").as_bytes()).await;
    })
}

fn query<'a>(w: &'a mut ResponseWriter, req: &'a Request) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let mut params: Vec<String> = req
            .query_params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        params.sort();

        let body = if params.is_empty() {
            "No query parameters provided\n".to_string()
        } else {
            format!("Query parameters: {}\n", params.join(", "))
        };
        send_text(w, StatusCode::Ok, body.as_bytes()).await;
    })
}

fn stream<'a>(w: &'a mut ResponseWriter, _req: &'a Request) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let body: Vec<u8> = (0..64).flat_map(|i| format!("line {i}\n").into_bytes()).collect();
        let mut headers = w.default_headers(0);
        headers.replace("content-type", "text/plain");

        if let Err(e) = stream_chunked(w, headers, body.as_slice(), DEFAULT_CHUNK_SIZE / 8).await {
            tracing::warn!(error = %e, "Failed to stream response");
        }
    })
}
