//! `tenantgrid edge` — describe the shared edge for a manifest.

use std::path::Path;

use tenantgrid_core::{ServiceManifest, TenantGridConfig};
use tenantgrid_gateway::{EdgeDescriptor, GatewayBridge};

pub fn run(config: &TenantGridConfig, manifest: &Path) -> anyhow::Result<EdgeDescriptor> {
    let manifest = ServiceManifest::from_file(manifest)?;
    Ok(GatewayBridge::new(&config.edge).build_edge(&config.edge.tenant_id_claim, &manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil;

    #[test]
    fn edge_has_routes_for_every_service() {
        let dir = tempfile::tempdir().unwrap();
        let config = testutil::config(dir.path());
        let edge = run(&config, &testutil::manifest(dir.path())).unwrap();
        assert_eq!(edge.services(), vec![("orders", false), ("users", true)]);
        assert_eq!(edge.authorizer.tenant_id_claim, config.edge.tenant_id_claim);
    }
}
