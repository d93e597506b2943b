//! Binary entrypoint for the dbviz server.
//!
//! Configuration comes from `DBVIZ_BIND`, `DBVIZ_PORT` and `DBVIZ_TICK_MS`
//! (see [`ServerConfig`]). Log filtering honours `RUST_LOG` (default `info`).

use dbviz_server::config::ServerConfig;
use dbviz_server::router::build_router;
use dbviz_server::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    let app = build_router(AppState::new(&config));

    let addr = config.addr();
    tracing::info!("dbviz server starting on {} (tick {:?})", addr, config.tick);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
