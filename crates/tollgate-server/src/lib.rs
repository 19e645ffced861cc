//! HTTP surface for the tollgate device-grant proxy.
//!
//! Routes map one-to-one onto the protocol steps:
//!
//! - `POST /device/code` — the device asks for a device/user code pair
//! - `GET /device` — the human's code-entry page
//! - `GET /auth/verify_code` — redirect to the upstream authorization server
//! - `GET /auth/redirect` — the upstream sends the browser back; tokens are
//!   minted or exchanged here
//! - `POST /device/token` — the device polls, or refreshes a token
//! - `POST /device/proxy` — opaque pass-through to the upstream token endpoint
//! - `GET /data/proxy/{*path}` — bearer-validated data forwarding
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tollgate_config::ProxyConfig;
//! use tollgate_oauth::HttpUpstream;
//! use tollgate_server::{AppState, Server};
//! use tollgate_store::MemoryStore;
//!
//! let config = ProxyConfig::from_env()?;
//! let upstream = Arc::new(HttpUpstream::new(config.request_timeout)?);
//! let state = AppState::new(config, Arc::new(MemoryStore::new()), upstream);
//! Server::new(state).run("127.0.0.1:8080".parse()?).await?;
//! ```

pub mod error;
pub mod routes;
pub mod state;
pub mod version;
pub mod views;

pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The tollgate HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server over a pre-built application state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(routes::index_handler))
            .route("/health", get(routes::health_handler))
            .route("/device/code", post(routes::generate_code_handler))
            .route("/device", get(routes::device_page_handler))
            .route("/device/token", post(routes::access_token_handler))
            .route("/device/proxy", post(routes::proxy_token_handler))
            .route("/auth/verify_code", get(routes::verify_code_handler))
            .route("/auth/redirect", get(routes::redirect_handler))
            .route("/data/proxy/{*path}", get(routes::data_proxy_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server until the listener fails.
    pub async fn run(self, bind_addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Starting device-grant proxy");
        axum::serve(listener, self.router()).await
    }

    /// Run with graceful shutdown, returning the bound address.
    pub async fn run_with_shutdown(
        self,
        bind_addr: SocketAddr,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Starting device-grant proxy");
        tokio::spawn(async move {
            axum::serve(listener, self.router())
                .with_graceful_shutdown(shutdown)
                .await
                .ok();
        });
        Ok(local_addr)
    }
}
