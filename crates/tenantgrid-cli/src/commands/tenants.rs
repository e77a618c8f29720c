//! `tenantgrid tenants` — list the tenant registry.

use tenantgrid_core::TenantGridConfig;
use tenantgrid_state::{TenantMappingRecord, TenantRegistry};

use super::open_store;

pub fn run(config: &TenantGridConfig, wave: Option<u32>) -> anyhow::Result<Vec<TenantMappingRecord>> {
    let registry = TenantRegistry::new(open_store(config)?);
    let records = match wave {
        Some(w) => registry.list_wave(w)?,
        None => registry.list()?,
    };
    Ok(records)
}
