use crate::acquire::{DriveCredential, RemoteAcquirer};
use crate::config::Config;
use crate::pipeline::RenderPipeline;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod routes_render;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub pipeline: Arc<RenderPipeline>,
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes(&ctx))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

fn api_routes(ctx: &AppContext) -> Router<AppContext> {
    let routes = Router::new().route("/render", post(routes_render::render));

    // Apply auth middleware only when enabled
    if ctx.config.server.auth.enabled {
        routes.layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::api_auth_middleware,
        ))
    } else {
        routes
    }
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Build the pipeline and its acquirer from configuration.
pub fn build_pipeline(config: &Config) -> Result<Arc<RenderPipeline>> {
    let credential = DriveCredential::resolve(&config.drive)
        .context("Failed to resolve remote-storage credential")?;
    let acquirer = Arc::new(RemoteAcquirer::new(
        credential,
        Duration::from_secs(config.render.acquire_timeout_secs),
    ));
    Ok(Arc::new(RenderPipeline::new(
        acquirer,
        config.render.clone(),
    )))
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let pipeline = build_pipeline(&config)?;
    let ctx = AppContext {
        config: Arc::new(config),
        pipeline,
    };

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
