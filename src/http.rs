//! Endpoint HTTP de liveness para orquestadores y monitores externos.

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tracing::info;

pub async fn serve(port: u16) -> Result<()> {
    let app = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Endpoint de liveness en http://{}/healthz", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn root() -> String {
    format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
