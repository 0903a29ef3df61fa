#![allow(clippy::must_use_candidate)]

mod auth;
mod cors;
mod health;
mod request_context;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::response::IntoResponse;
use axum::{Json, Router};
use prism_config::Config;
use prism_llm::{GatewayState, ProviderRegistry};
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configured provider fails to construct, so a
    /// broken configuration is caught at startup.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));

        let registry = ProviderRegistry::from_config(config)?;
        let state = GatewayState::new(registry);

        let mut app = Router::new()
            .route("/", axum::routing::get(root_handler))
            .route("/health", axum::routing::get(health::health_handler))
            .merge(prism_llm::gateway_router(state));

        // Middleware layers, innermost first

        // Request context runs just before handlers, after auth has resolved
        // the caller's key
        app = app.layer(axum::middleware::from_fn(request_context::request_context_middleware));

        app = app.layer(TraceLayer::new_for_http());

        if let Some(ref cors_config) = config.server.cors {
            app = app.layer(cors::cors_layer(cors_config));
        }

        if let Some(ref auth_config) = config.server.auth {
            let auth_config = Arc::new(auth_config.clone());
            app = app.layer(axum::middleware::from_fn(move |req, next| {
                let config = Arc::clone(&auth_config);
                async move { auth::auth_middleware(config, req, next).await }
            }));
        }

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

/// Handle `GET /`
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "prism",
        "status": "ok",
    }))
}
