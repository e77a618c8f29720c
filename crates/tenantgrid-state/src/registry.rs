//! TenantRegistry — idempotent tenant → infrastructure-generation mapping.
//!
//! Bookkeeping only: removing a tenant here does not tear down its
//! topology. Redeploys update the commit id and nothing else, so a tenant
//! never moves to a different stack or wave without an explicit migration.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::TenantMappingRecord;

/// Whether an upsert created a new record or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Registry facade over the tenant mappings table.
#[derive(Clone)]
pub struct TenantRegistry {
    store: StateStore,
}

impl TenantRegistry {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Create the record if absent, otherwise update only its commit id.
    pub fn upsert(
        &self,
        tenant_id: &str,
        stack_name: &str,
        commit_id: &str,
        wave_number: u32,
    ) -> StateResult<UpsertOutcome> {
        let outcome = self.store.upsert_mapping(&TenantMappingRecord {
            tenant_id: tenant_id.to_string(),
            stack_name: stack_name.to_string(),
            commit_id: commit_id.to_string(),
            wave_number,
        })?;
        info!(tenant_id, commit_id, ?outcome, "tenant registry upsert");
        Ok(outcome)
    }

    /// Hard-delete a record. Returns false when there was nothing to delete.
    pub fn remove(&self, tenant_id: &str) -> StateResult<bool> {
        let existed = self.store.delete_mapping(tenant_id)?;
        info!(tenant_id, existed, "tenant registry remove");
        Ok(existed)
    }

    pub fn get(&self, tenant_id: &str) -> StateResult<Option<TenantMappingRecord>> {
        self.store.get_mapping(tenant_id)
    }

    pub fn list(&self) -> StateResult<Vec<TenantMappingRecord>> {
        self.store.list_mappings()
    }

    /// Tenants deployed in a given wave, for staged update pipelines.
    pub fn list_wave(&self, wave_number: u32) -> StateResult<Vec<TenantMappingRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.wave_number == wave_number)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TenantRegistry {
        TenantRegistry::new(StateStore::open_in_memory().unwrap())
    }

    #[test]
    fn upsert_round_trip_keeps_stack_and_wave() {
        let reg = registry();
        assert_eq!(reg.upsert("t", "s", "c1", 2).unwrap(), UpsertOutcome::Created);
        assert_eq!(reg.upsert("t", "s2", "c2", 2).unwrap(), UpsertOutcome::Updated);

        let rec = reg.get("t").unwrap().unwrap();
        assert_eq!(rec.stack_name, "s");
        assert_eq!(rec.commit_id, "c2");
        assert_eq!(rec.wave_number, 2);
    }

    #[test]
    fn repeated_upsert_with_same_values_is_stable() {
        let reg = registry();
        reg.upsert("t", "s", "c1", 1).unwrap();
        reg.upsert("t", "s", "c1", 1).unwrap();
        assert_eq!(reg.list().unwrap().len(), 1);
    }

    #[test]
    fn remove_twice_is_a_no_op() {
        let reg = registry();
        reg.upsert("t", "s", "c1", 1).unwrap();
        assert!(reg.remove("t").unwrap());
        assert!(!reg.remove("t").unwrap());
    }

    #[test]
    fn remove_unknown_tenant_is_ok() {
        assert!(!registry().remove("ghost").unwrap());
    }

    #[test]
    fn list_wave_filters() {
        let reg = registry();
        reg.upsert("a", "sa", "c", 1).unwrap();
        reg.upsert("b", "sb", "c", 2).unwrap();
        reg.upsert("c", "sc", "c", 2).unwrap();
        let mut wave2: Vec<String> = reg.list_wave(2).unwrap().into_iter().map(|r| r.tenant_id).collect();
        wave2.sort();
        assert_eq!(wave2, vec!["b", "c"]);
    }
}
