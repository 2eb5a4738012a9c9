use crate::config::Config;
use crate::probe::{find_tool, FfprobeLoader, MetadataCache, MetadataLoader};
use crate::render::{Compositor, FfmpegCompositor, RenderService};
use crate::state::RenderRegistry;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod error;
pub mod openapi;
pub mod routes_render;
pub mod routes_sse;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub registry: Arc<RenderRegistry>,
    pub renders: Arc<RenderService>,
    pub config: Arc<Config>,
}

impl AppContext {
    /// Context wired to ffprobe and ffmpeg.
    pub fn new(config: Config) -> Self {
        let ffprobe = find_tool("ffprobe", config.tools.ffprobe.as_deref())
            .or_else(|| config.tools.ffprobe.clone())
            .unwrap_or_else(|| PathBuf::from("ffprobe"));

        let loader = Arc::new(FfprobeLoader::new(ffprobe, config.server.public_dir.clone()));
        let compositor = Arc::new(FfmpegCompositor::new(&config));
        Self::with_backends(config, loader, compositor)
    }

    /// Context with explicit metadata and compositor backends.
    pub fn with_backends(
        config: Config,
        loader: Arc<dyn MetadataLoader>,
        compositor: Arc<dyn Compositor>,
    ) -> Self {
        let registry = RenderRegistry::in_memory(
            config.render.output_dir.clone(),
            config.render.container.clone(),
        );
        let metadata = Arc::new(MetadataCache::with_limits(
            loader,
            config.media.metadata_timeout(),
            config.media.duration_tolerance_secs,
        ));
        let renders = RenderService::new(registry.clone(), metadata, compositor, &config);

        Self {
            registry,
            renders,
            config: Arc::new(config),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let public_dir = ctx.config.server.public_dir.clone();

    let mut app = Router::new()
        .merge(routes_render::render_routes())
        .merge(routes_sse::sse_routes())
        // OpenAPI documentation (Swagger UI at /api/docs)
        .nest("/api", openapi::openapi_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Template clips and other public assets
    if public_dir.exists() {
        tracing::info!("Serving static files from {:?}", public_dir);
        app = app.fallback_service(ServeDir::new(&public_dir));
    }

    app
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    tokio::fs::create_dir_all(&config.render.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory {:?}",
                config.render.output_dir
            )
        })?;

    let ctx = AppContext::new(config);
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. In-flight renders are not waited for.
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
