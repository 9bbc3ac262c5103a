//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::middleware::{self, AllowedOrigins};
use super::openapi::openapi_json;
use super::routes::{dashboard, health, services, sync, traces};
use crate::core::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::data::SqliteService;
use crate::domain::sync::SyncTrigger;

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

/// Reporting API router under `/api/v1`
pub fn build_router(
    database: Arc<SqliteService>,
    trigger: SyncTrigger,
    allowed_origins: &AllowedOrigins,
) -> Router {
    Router::new()
        .route("/api/v1/openapi.json", get(openapi_json))
        .nest(
            "/api/v1/health",
            health::routes(database.clone(), trigger.clone()),
        )
        .nest("/api/v1/services", services::routes(database.clone()))
        .nest("/api/v1/traces", traces::routes(database.clone()))
        .nest("/api/v1/dashboard", dashboard::routes(database.clone()))
        .nest("/api/v1/sync", sync::routes(database, trigger))
        .fallback(middleware::handle_404)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(middleware::cors(allowed_origins))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);
        Self {
            app,
            allowed_origins,
        }
    }

    /// Serve until shutdown is triggered; returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            allowed_origins,
        } = self;

        let shutdown = app.shutdown.clone();
        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(
            host.parse()
                .with_context(|| format!("Invalid listen address: {}", host))?,
            port,
        );

        let router = build_router(app.database.clone(), app.trigger.clone(), &allowed_origins);

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!(%addr, "API server listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}
