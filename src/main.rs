use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use docatlas_backend::config::RagConfig;
use docatlas_backend::state::AppState;
use docatlas_backend::{logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(RagConfig::from_env()?);
    logging::init(&config);

    let state = AppState::initialize(config).await?;

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(8000);
    let bind_addr = format!("127.0.0.1:{}", port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
