use std::net::SocketAddr;

use axum::Router;
use axum::extract::MatchedPath;
use http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::bootstrap::app_context::AppContext;
use crate::bootstrap::config::Config;
use crate::presentation;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::http::health::health,
        crate::presentation::ws::ws_entry,
    ),
    tags(
        (name = "Health", description = "System health checks"),
        (name = "Realtime", description = "Real-time messaging gateway")
    )
)]
pub struct ApiDoc;

pub fn init_tracing(cfg: &Config) {
    let default_filter = if cfg.debug {
        "pairfinder_api=debug,axum=info,tower_http=debug"
    } else {
        "pairfinder_api=info,axum=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()))
        .init();
}

pub fn build_cors(cfg: &Config) -> anyhow::Result<CorsLayer> {
    let methods = [
        http::Method::GET,
        http::Method::POST,
        http::Method::PUT,
        http::Method::DELETE,
        http::Method::PATCH,
        http::Method::OPTIONS,
    ];
    let headers = [http::header::CONTENT_TYPE, http::header::AUTHORIZATION];

    if cfg.allow_any_origin() {
        // Credentials cannot be combined with a wildcard origin.
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers));
    }

    let mut origins = Vec::with_capacity(cfg.cors_allowed_origins.len());
    for origin in &cfg.cors_allowed_origins {
        let value = HeaderValue::from_str(origin)
            .map_err(|_| anyhow::anyhow!("invalid origin in CORS_ALLOWED_ORIGINS: {origin}"))?;
        origins.push(value);
    }
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true))
}

/// Assembles the full application router. Opens no sockets; tests drive the
/// returned router directly.
pub fn build_router(ctx: &AppContext) -> anyhow::Result<Router> {
    let cors = build_cors(&ctx.cfg)?;
    let router = Router::new()
        .merge(presentation::http::health::routes())
        .merge(presentation::ws::routes(ctx.clone()))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let matched = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                tracing::info_span!("http", %method, %uri, matched_path = %matched)
            }),
        );
    Ok(router)
}

/// Binds the listening socket and runs the accept loop until the process is
/// terminated.
pub async fn serve(app: Router, cfg: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    info!(%addr, "HTTP API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
