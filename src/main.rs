use driftfeed::api::{create_router, AppState};
use driftfeed::config::Config;
use driftfeed::db::Store;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let store = Store::connect(&config.redis_url)?;
    let state = AppState::new(store, config.session_ttl_secs);

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Feed service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
