pub mod edge;
pub mod offboard;
pub mod provision;
pub mod serve;
pub mod tenants;

use tenantgrid_core::TenantGridConfig;
use tenantgrid_routing::{allocator_for, Listener};
use tenantgrid_state::StateStore;
use tracing::debug;

/// Open the state store under the configured data directory.
pub(crate) fn open_store(config: &TenantGridConfig) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.state.data_dir)?;
    let db_path = config.db_path();
    debug!(path = %db_path.display(), "opening state store");
    Ok(StateStore::open(&db_path)?)
}

/// The shared listener, reloaded from persisted rules.
pub(crate) fn open_listener(
    config: &TenantGridConfig,
    store: &StateStore,
) -> anyhow::Result<Listener> {
    Ok(Listener::load(
        &config.routing.listener,
        allocator_for(config.routing.allocator),
        store.clone(),
    )?)
}
