// src/hash/mod.rs

//! Content hashing for dependencies and outputs.
//!
//! - A file digest is the BLAKE3 hex digest of its bytes.
//! - A directory digest is the BLAKE3 digest over its files' sorted
//!   `(relative_path, file_digest)` pairs, suffixed with [`DIR_SUFFIX`].
//!   Traversal order of the filesystem never leaks into the digest.
//!
//! [`cache`] memoizes file digests for the duration of one reproduce run.

pub mod cache;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use blake3::Hasher;
use tracing::debug;

use crate::errors::{ReprodagError, Result};
use crate::fs::{walk_files, FileSystem};

pub use cache::HashCache;

/// Suffix that marks a digest as covering a directory tree.
pub const DIR_SUFFIX: &str = ".dir";

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Aggregate hash from `(relative_path, file_digest)` pairs.
///
/// `entries` must already be sorted by relative path.
pub fn compute_aggregate_hash(entries: &[(String, String)]) -> String {
    let mut hasher = Hasher::new();
    for (rel, digest) in entries {
        hasher.update(rel.as_bytes());
        hasher.update(b"\0");
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }
    format!("{}{}", hasher.finalize().to_hex(), DIR_SUFFIX)
}

/// Hash a command string.
pub fn hash_cmd(cmd: &str) -> String {
    blake3::hash(cmd.as_bytes()).to_hex().to_string()
}

/// Computes content digests for paths relative to a pipeline root.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl ContentHasher {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a pipeline-relative path.
    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Digest of a file or directory tree.
    ///
    /// Fails with [`ReprodagError::MissingPath`] if nothing exists at `rel`.
    pub fn hash(&self, rel: &str) -> Result<String> {
        self.hash_with(rel, None)
    }

    /// Like [`ContentHasher::hash`], but consults and fills `cache` for file
    /// digests.
    pub fn hash_cached(&self, rel: &str, cache: &mut HashCache) -> Result<String> {
        self.hash_with(rel, Some(cache))
    }

    fn hash_with(&self, rel: &str, mut cache: Option<&mut HashCache>) -> Result<String> {
        let path = self.resolve(rel);
        if !self.fs.exists(&path) {
            return Err(ReprodagError::MissingPath(path));
        }

        if !self.fs.is_dir(&path) {
            return self.file_digest(&path, cache);
        }

        let files = walk_files(self.fs.as_ref(), &path)?;
        let mut entries = Vec::with_capacity(files.len());
        for file_rel in files {
            let digest = self.file_digest(&path.join(&file_rel), cache.as_deref_mut())?;
            entries.push((file_rel, digest));
        }

        let hash = compute_aggregate_hash(&entries);
        debug!(path = %rel, files = entries.len(), hash = %hash, "computed directory hash");
        Ok(hash)
    }

    fn file_digest(&self, path: &Path, cache: Option<&mut HashCache>) -> Result<String> {
        match cache {
            Some(cache) => cache.get_or_compute(self.fs.as_ref(), path),
            None => {
                debug!("hashing file {:?}", path);
                compute_file_hash(self.fs.as_ref(), path)
            }
        }
    }
}
