// src/hash/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::hash::compute_file_hash;

/// In-memory cache of file hashes for one reproduce run.
///
/// A dependency shared by several stages is read once. Paths rewritten by a
/// stage must be invalidated before they are hashed again.
#[derive(Debug, Default)]
pub struct HashCache {
    hashes: HashMap<PathBuf, String>,
}

impl HashCache {
    pub fn new() -> Self {
        Self {
            hashes: HashMap::new(),
        }
    }

    /// Get the hash for a file, computing and caching it if necessary.
    pub fn get_or_compute(&mut self, fs: &dyn FileSystem, path: &Path) -> Result<String> {
        if let Some(hash) = self.hashes.get(path) {
            return Ok(hash.clone());
        }

        debug!("cache miss: computing hash for {:?}", path);
        let hash = compute_file_hash(fs, path)?;
        self.hashes.insert(path.to_path_buf(), hash.clone());
        Ok(hash)
    }

    /// Drop every cached hash at or below `path` (a file or a directory).
    pub fn invalidate(&mut self, path: &Path) {
        let before = self.hashes.len();
        self.hashes.retain(|p, _| !p.starts_with(path));
        if self.hashes.len() < before {
            debug!(removed = before - self.hashes.len(), "invalidated cache for {:?}", path);
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
