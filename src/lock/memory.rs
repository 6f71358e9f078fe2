// src/lock/memory.rs

use std::collections::BTreeMap;

use crate::errors::Result;
use crate::lock::{LockEntry, LockStore};
use crate::types::StageName;

/// Lock entries kept in memory. Used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockStore {
    entries: BTreeMap<StageName, LockEntry>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &BTreeMap<StageName, LockEntry> {
        &self.entries
    }
}

impl LockStore for MemoryLockStore {
    fn get(&self, stage: &str) -> Result<Option<LockEntry>> {
        Ok(self.entries.get(stage).cloned())
    }

    fn put(&mut self, stage: &str, entry: LockEntry) -> Result<()> {
        self.entries.insert(stage.to_string(), entry);
        Ok(())
    }

    fn remove(&mut self, stage: &str) -> Result<bool> {
        Ok(self.entries.remove(stage).is_some())
    }

    fn prune(&mut self, active: &[StageName]) -> Result<Vec<StageName>> {
        let stale: Vec<StageName> = self
            .entries
            .keys()
            .filter(|name| !active.contains(name))
            .cloned()
            .collect();
        for name in stale.iter() {
            self.entries.remove(name);
        }
        Ok(stale)
    }
}
