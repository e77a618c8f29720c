//! StateStore — redb-backed state persistence for TenantGrid.
//!
//! Provides typed operations over tenant mappings, listener rules, and
//! topology records. All values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::registry::UpsertOutcome;
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(|e| match e {
            redb::DatabaseError::DatabaseAlreadyOpen => StateError::Locked {
                path: path.display().to_string(),
            },
            other => StateError::Open(other.to_string()),
        })?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(TENANT_MAPPINGS).map_err(map_err!(Table))?;
        txn.open_table(LISTENER_RULES).map_err(map_err!(Table))?;
        txn.open_table(TOPOLOGIES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Tenant mappings ────────────────────────────────────────────

    /// Create the mapping, or update only its `commit_id` when it exists.
    ///
    /// Read and write happen in one write transaction, so concurrent
    /// upserts for the same tenant cannot interleave.
    pub fn upsert_mapping(&self, record: &TenantMappingRecord) -> StateResult<UpsertOutcome> {
        let key = record.tenant_id.as_str();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome;
        {
            let mut table = txn.open_table(TENANT_MAPPINGS).map_err(map_err!(Table))?;
            let existing: Option<TenantMappingRecord> = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => {
                    Some(serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?)
                }
                None => None,
            };

            let stored = match existing {
                Some(mut current) => {
                    current.commit_id = record.commit_id.clone();
                    outcome = UpsertOutcome::Updated;
                    current
                }
                None => {
                    outcome = UpsertOutcome::Created;
                    record.clone()
                }
            };

            let value = serde_json::to_vec(&stored).map_err(map_err!(Encode))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(tenant_id = key, ?outcome, "tenant mapping upserted");
        Ok(outcome)
    }

    /// Get a tenant mapping by tenant id.
    pub fn get_mapping(&self, tenant_id: &str) -> StateResult<Option<TenantMappingRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TENANT_MAPPINGS).map_err(map_err!(Table))?;
        match table.get(tenant_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: TenantMappingRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all tenant mappings.
    pub fn list_mappings(&self) -> StateResult<Vec<TenantMappingRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TENANT_MAPPINGS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: TenantMappingRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete a tenant mapping. Returns true if it existed.
    pub fn delete_mapping(&self, tenant_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(TENANT_MAPPINGS).map_err(map_err!(Table))?;
            existed = table.remove(tenant_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(tenant_id, existed, "tenant mapping deleted");
        Ok(existed)
    }

    // ── Listener rules ─────────────────────────────────────────────

    /// Insert or replace a listener rule.
    pub fn put_rule(&self, rule: &RoutingRule) -> StateResult<()> {
        let key = rule.table_key();
        let value = serde_json::to_vec(rule).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(LISTENER_RULES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, tenant_id = %rule.tenant_id, "listener rule stored");
        Ok(())
    }

    /// List every rule registered on a listener, in priority order.
    pub fn list_rules(&self, listener: &str) -> StateResult<Vec<RoutingRule>> {
        let prefix = format!("{listener}/");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LISTENER_RULES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let rule: RoutingRule =
                    serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
                results.push(rule);
            }
        }
        Ok(results)
    }

    /// Delete all of a tenant's rules on a listener. Returns number deleted.
    pub fn delete_rules_for_tenant(&self, listener: &str, tenant_id: &str) -> StateResult<u32> {
        let keys: Vec<String> = self
            .list_rules(listener)?
            .into_iter()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.table_key())
            .collect();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = keys.len() as u32;
        {
            let mut table = txn.open_table(LISTENER_RULES).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(listener, tenant_id, count, "listener rules deleted");
        Ok(count)
    }

    // ── Topologies ─────────────────────────────────────────────────

    /// Insert or replace a topology record.
    pub fn put_topology(&self, record: &TopologyRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TOPOLOGIES).map_err(map_err!(Table))?;
            table
                .insert(record.tenant_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a topology record by tenant id.
    pub fn get_topology(&self, tenant_id: &str) -> StateResult<Option<TopologyRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TOPOLOGIES).map_err(map_err!(Table))?;
        match table.get(tenant_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: TopologyRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Delete a topology record. Returns true if it existed.
    pub fn delete_topology(&self, tenant_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(TOPOLOGIES).map_err(map_err!(Table))?;
            existed = table.remove(tenant_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}
