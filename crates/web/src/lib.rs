//! gref web server and REST API.
//!
//! Thin axum layer over the registry [`Backend`]:
//! - `GET /ping` backend liveness
//! - `POST /{object_type}` create a mapping
//! - `PUT /{object_type}/{canonical}` link another source
//! - `GET /{object_type}/{source}/{source_id}` look up the canonical id
//! - `GET /{object_type}/{canonical}` list every linked source

pub mod api;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use gref_core::backend::Backend;
use gref_core::config::AppConfig;

/// Shared application state accessible from all handlers.
pub struct AppState {
    /// The booted storage backend.
    pub backend: Arc<dyn Backend>,
    pub config: AppConfig,
}

impl AppState {
    pub fn base_url(&self) -> &str {
        &self.config.server.base_url
    }
}

/// Build the full router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::status::routes())
        .merge(api::mappings::routes())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a web server over an already-booted backend.
    pub fn new(config: AppConfig, backend: Box<dyn Backend>) -> Self {
        let state = Arc::new(AppState {
            backend: Arc::from(backend),
            config,
        });
        Self { state }
    }

    /// Serve on `listen_addr` until `shutdown` resolves.
    pub async fn start<F>(self, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = router(self.state);

        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("web server stopped");
        Ok(())
    }
}
