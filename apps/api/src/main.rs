mod config;
mod errors;
mod rate_limit;
mod resources;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::rate_limit::{build_limiter, spawn_limiter_cleanup};
use crate::resources::{Profile, Prompt, Resource, Template};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{CollectionStore, JsonFileStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting GPT Builder API v{}", env!("CARGO_PKG_VERSION"));

    let store = JsonFileStore::new(&config.data_dir);
    for collection in [Profile::COLLECTION, Prompt::COLLECTION, Template::COLLECTION] {
        store.ensure(collection).await?;
    }
    info!("Data directory: {}", store.dir().display());

    let limiter = build_limiter(config.rate_limit_window, config.rate_limit_max_requests);
    info!(
        "Rate limit: {} requests per {}s per client",
        config.rate_limit_max_requests,
        config.rate_limit_window.as_secs()
    );

    if let Some(dir) = &config.static_dir {
        info!("Serving UI from {}", dir.display());
    }

    let state = AppState {
        store: Arc::new(store),
        config: config.clone(),
        limiter: Arc::new(limiter),
    };
    spawn_limiter_cleanup(state.limiter.clone(), config.rate_limit_window);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
