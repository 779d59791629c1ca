use crate::config::Config;
use crate::proxy::StreamProxy;
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use streamgate_restreamer::{ClientConfig, RestreamerClient, SharedClient};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api_key;
pub mod error;
pub mod rate_limit;
pub mod request_id;
pub mod routes_proxy;
pub mod routes_streams;

use api_key::{api_key_middleware, ApiKey};
use rate_limit::{create_limiter, rate_limit_middleware, SharedLimiter};
use request_id::request_id_middleware;

/// Preflight cache lifetime for the management API.
const CORS_MAX_AGE: Duration = Duration::from_secs(86400);

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Control-plane client (owns the session)
    pub restreamer: SharedClient,
    /// Upstream fetcher for the HLS proxy
    pub proxy: Arc<StreamProxy>,
    /// Admission window for stream creation
    pub limiter: SharedLimiter,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let restreamer = RestreamerClient::new(
            ClientConfig::new(
                config.restreamer.url.clone(),
                config.restreamer.username.clone(),
                config.restreamer.password.clone(),
            )
            .with_timeout(config.restreamer.timeout()),
        );
        let proxy = StreamProxy::new(&config.proxy);
        let limiter = create_limiter(config.rate_limit.max_requests, config.rate_limit.window());

        Self {
            config: Arc::new(config),
            restreamer: Arc::new(restreamer),
            proxy: Arc::new(proxy),
            limiter,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let api = api_routes(&ctx).layer(cors_layer(&ctx.config.server.cors_origins));
    let proxy = routes_proxy::proxy_routes(&ctx.config.proxy.public_path);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .merge(api)
        .merge(proxy)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_id_middleware)),
        )
        .with_state(ctx)
}

fn api_routes(ctx: &AppContext) -> Router<AppContext> {
    // Only creation is rate limited
    let create = Router::new()
        .route("/api/streams", post(routes_streams::create_stream))
        .route_layer(middleware::from_fn_with_state(
            ctx.limiter.clone(),
            rate_limit_middleware,
        ));

    let routes = Router::new()
        .route("/api/streams", get(routes_streams::list_streams))
        .route(
            "/api/streams/:id",
            get(routes_streams::get_stream).delete(routes_streams::delete_stream),
        )
        .route(
            "/api/streams/:id/restart",
            post(routes_streams::restart_stream),
        )
        .merge(create);

    match ctx.config.server.api_key.as_deref() {
        Some(key) => routes.route_layer(middleware::from_fn_with_state(
            ApiKey::new(key),
            api_key_middleware,
        )),
        None => routes,
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-api-key"),
        ])
        .max_age(CORS_MAX_AGE)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    if config.server.api_key.is_none() {
        tracing::warn!("No API key configured; stream management API is unprotected");
    }

    let ctx = AppContext::new(config);
    tracing::info!(
        control_plane = %ctx.restreamer.base_url(),
        proxy_path = %ctx.proxy.public_path(),
        "Gateway configured"
    );

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

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
