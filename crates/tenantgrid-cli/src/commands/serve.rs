//! `tenantgrid serve` — run the edge emulator.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tenantgrid_core::{ServiceManifest, TenantGridConfig};
use tenantgrid_gateway::{build_router, Authorizer, EdgeState, GatewayBridge};
use tracing::info;

use super::{open_listener, open_store};

/// Environment variable holding the HS256 token signing secret.
pub const JWT_SECRET_ENV: &str = "TENANTGRID_JWT_SECRET";

pub async fn run(config: &TenantGridConfig, port: u16, manifest: &Path) -> anyhow::Result<()> {
    let secret = std::env::var(JWT_SECRET_ENV)
        .with_context(|| format!("{JWT_SECRET_ENV} must be set"))?;
    let manifest = ServiceManifest::from_file(manifest)?;

    // ── State + listener ─────────────────────────────────────────
    let store = open_store(config)?;
    let listener = open_listener(config, &store)?;
    info!(
        listener = %listener.name(),
        rules = listener.snapshot().await.len(),
        "listener loaded"
    );

    // ── Edge ─────────────────────────────────────────────────────
    let edge = GatewayBridge::new(&config.edge).build_edge(&config.edge.tenant_id_claim, &manifest);
    let state = EdgeState {
        authorizer: Arc::new(Authorizer::new(secret.as_bytes(), &edge)),
        edge: Arc::new(edge),
        listener: Arc::new(listener),
    };
    let router = build_router(state);

    // ── HTTP server ──────────────────────────────────────────────
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "edge emulator listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            info!("shutdown signal received");
        })
        .await?;

    info!("edge emulator stopped");
    Ok(())
}
