// src/lock/mod.rs

//! Per-stage record of what was observed at the last successful execution.
//!
//! The lock only ever holds hashes and param values. Output annotations live
//! in the declaration and never reach this module.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ReprodagError, Result};
use crate::types::StageName;

pub use file::FileLockStore;
pub use memory::MemoryLockStore;

/// Format version written to every lock file.
pub const LOCK_VERSION: u32 = 1;

/// What a stage looked like when it last succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockEntry {
    pub cmd_hash: String,
    /// Dependency path → digest.
    #[serde(default)]
    pub deps: BTreeMap<String, String>,
    /// Dotted param key → value.
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
    /// Output path → digest.
    #[serde(default)]
    pub outs: BTreeMap<String, String>,
}

/// On-disk shape of the lock document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    pub version: u32,
    #[serde(default)]
    pub stage: BTreeMap<StageName, LockEntry>,
}

impl Default for LockFile {
    fn default() -> Self {
        Self {
            version: LOCK_VERSION,
            stage: BTreeMap::new(),
        }
    }
}

impl LockFile {
    pub fn parse(contents: &str) -> Result<Self> {
        let lock: LockFile = toml::from_str(contents)?;
        if lock.version != LOCK_VERSION {
            return Err(ReprodagError::ConfigError(format!(
                "unsupported lock version {} (expected {})",
                lock.version, LOCK_VERSION
            )));
        }
        Ok(lock)
    }

    /// Deterministic rendering: entries and their maps are sorted.
    pub fn render(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Persistence of per-stage lock entries.
pub trait LockStore: Send {
    fn get(&self, stage: &str) -> Result<Option<LockEntry>>;

    /// Replace the entry of `stage`, leaving every other entry untouched.
    fn put(&mut self, stage: &str, entry: LockEntry) -> Result<()>;

    /// Drop the entry of `stage`. Returns whether one existed.
    fn remove(&mut self, stage: &str) -> Result<bool>;

    /// Drop entries of stages not in `active`. Returns the dropped names.
    fn prune(&mut self, active: &[StageName]) -> Result<Vec<StageName>>;
}
