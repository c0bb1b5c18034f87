use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{debug, info, warn, Instrument};

use crate::config::ServerConfig;
use crate::http::connection::{ConnectionSession, SessionConfig};
use crate::http::request::Method;
use crate::routing::{HandlerRef, InvalidPattern, Middleware, Route, Router, Routes};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Server under construction. Routes, middleware and the not-found handler
/// can only be changed here, before [`bind`](Server::bind).
pub struct Server {
    config: ServerConfig,
    routes: Routes,
}

/// A bound server, ready to accept.
pub struct Listening {
    listener: TcpListener,
    routes: Arc<Routes>,
    session: SessionConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: Routes::default(),
        }
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.routes.router
    }

    pub fn route(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Route, InvalidPattern> {
        self.routes.router.route(pattern, handler)
    }

    pub fn on(
        &mut self,
        method: Method,
        pattern: &str,
        handler: HandlerRef,
    ) -> Result<&mut Route, InvalidPattern> {
        self.routes.router.on(method, pattern, handler)
    }

    pub fn get(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Route, InvalidPattern> {
        self.routes.router.get(pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: HandlerRef) -> Result<&mut Route, InvalidPattern> {
        self.routes.router.post(pattern, handler)
    }

    /// Adds a global middleware; the first added runs outermost.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.routes.middleware.push(Arc::new(middleware));
        self
    }

    /// Replaces the handler used when no route matches.
    pub fn not_found(&mut self, handler: HandlerRef) -> &mut Self {
        self.routes.not_found = handler;
        self
    }

    pub async fn bind(self) -> anyhow::Result<Listening> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.listen_addr))?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Listening {
            listener,
            session: SessionConfig::from(&self.config),
            routes: Arc::new(self.routes),
        })
    }
}

impl Listening {
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, one task per connection.
    ///
    /// Dropping this future closes the listening socket. Sessions already
    /// running are left to finish on their own.
    pub async fn serve(self) -> anyhow::Result<()> {
        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            info!("Accepted connection from {}", peer);

            let session = ConnectionSession::from_tcp(socket, Arc::clone(&self.routes), self.session.clone());
            tokio::spawn(
                async move {
                    let reason = session.run().await;
                    debug!(%reason, "Connection closed");
                }
                .instrument(tracing::info_span!("conn", %peer)),
            );
        }
    }
}
