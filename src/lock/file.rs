// src/lock/file.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::fs::{write_atomic, FileSystem};
use crate::lock::{LockEntry, LockFile, LockStore};
use crate::types::StageName;

/// Lock entries stored in a TOML file next to the declaration.
///
/// Every operation reads the current file, so entries committed by an
/// earlier operation are always visible. A missing file behaves as an empty
/// lock; only `put` creates it.
#[derive(Debug, Clone)]
pub struct FileLockStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileLockStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole lock document, or `None` when the file does not exist.
    pub fn load(&self) -> Result<Option<LockFile>> {
        if !self.fs.exists(&self.path) {
            return Ok(None);
        }
        let contents = self.fs.read_to_string(&self.path)?;
        Ok(Some(LockFile::parse(&contents)?))
    }

    fn save(&self, lock: &LockFile) -> Result<()> {
        let rendered = lock.render()?;
        write_atomic(self.fs.as_ref(), &self.path, rendered.as_bytes())?;
        debug!(path = %self.path.display(), stages = lock.stage.len(), "wrote lock file");
        Ok(())
    }
}

impl LockStore for FileLockStore {
    fn get(&self, stage: &str) -> Result<Option<LockEntry>> {
        Ok(self
            .load()?
            .and_then(|mut lock| lock.stage.remove(stage)))
    }

    fn put(&mut self, stage: &str, entry: LockEntry) -> Result<()> {
        let mut lock = self.load()?.unwrap_or_default();
        lock.stage.insert(stage.to_string(), entry);
        self.save(&lock)
    }

    fn remove(&mut self, stage: &str) -> Result<bool> {
        let Some(mut lock) = self.load()? else {
            return Ok(false);
        };
        if lock.stage.remove(stage).is_none() {
            return Ok(false);
        }
        self.save(&lock)?;
        Ok(true)
    }

    fn prune(&mut self, active: &[StageName]) -> Result<Vec<StageName>> {
        let Some(mut lock) = self.load()? else {
            return Ok(Vec::new());
        };

        let stale: Vec<StageName> = lock
            .stage
            .keys()
            .filter(|name| !active.contains(name))
            .cloned()
            .collect();
        if stale.is_empty() {
            return Ok(stale);
        }

        for name in stale.iter() {
            lock.stage.remove(name);
        }
        self.save(&lock)?;
        debug!(pruned = ?stale, "pruned lock entries of undeclared stages");
        Ok(stale)
    }
}
