use anyhow::Result;
use dotenvy::dotenv;
use tracing::info;

use pairfinder_api::bootstrap::app_context::AppContext;
use pairfinder_api::bootstrap::config::Config;
use pairfinder_api::bootstrap::server::{build_router, init_tracing, serve};
use pairfinder_api::infrastructure::realtime::Hub;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cfg = Config::from_env()?;
    init_tracing(&cfg);
    info!(?cfg, "Starting pairfinder backend");

    let hub = Hub::new();
    let ctx = AppContext::new(cfg, hub);

    let app = build_router(&ctx)?;
    serve(app, &ctx.cfg).await
}
