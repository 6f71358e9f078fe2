// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::{ReprodagError, Result};
use crate::fs::FileSystem;

/// Default name of the pipeline declaration.
pub const DEFAULT_PIPELINE_FILE: &str = "reprodag.toml";

/// Read the declaration at `path` and return the raw `RawPipelineFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (graph correctness, etc.). Use [`load_and_validate`] for that.
/// A missing file is a [`ReprodagError::ConfigError`].
pub fn load_from_path(fs: &dyn FileSystem, path: &Path) -> Result<RawPipelineFile> {
    let contents = read_pipeline_text(fs, path)?.ok_or_else(|| {
        ReprodagError::ConfigError(format!(
            "pipeline declaration not found: {}",
            path.display()
        ))
    })?;

    let raw: RawPipelineFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a pipeline declaration and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - empty pipelines and bad `[config]` values,
///   - malformed stages (empty command, duplicate or escaping outputs),
///   - cycles and ambiguous output producers.
pub fn load_and_validate(fs: &dyn FileSystem, path: &Path) -> Result<PipelineFile> {
    let raw = load_from_path(fs, path)?;
    PipelineFile::try_from(raw)
}

/// Parse and validate a declaration that has already been read.
pub fn parse_pipeline(contents: &str) -> Result<PipelineFile> {
    let raw: RawPipelineFile = toml::from_str(contents)?;
    PipelineFile::try_from(raw)
}

/// Read a declaration through a [`FileSystem`], if it exists.
pub fn read_pipeline_text(fs: &dyn FileSystem, path: &Path) -> Result<Option<String>> {
    if !fs.exists(path) {
        return Ok(None);
    }
    Ok(Some(fs.read_to_string(path)?))
}

/// Helper to resolve a default declaration path.
pub fn default_pipeline_path() -> PathBuf {
    PathBuf::from(DEFAULT_PIPELINE_FILE)
}

/// Directory that all declared paths are relative to.
///
/// - If the declaration path has a non-empty parent (e.g.
///   "project/reprodag.toml"), that directory is used.
/// - A bare filename falls back to the current working directory.
pub fn pipeline_root(pipeline_path: &Path) -> PathBuf {
    match pipeline_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Derive the lock path from a declaration path: `reprodag.toml` →
/// `reprodag.lock`.
pub fn lock_path_for(pipeline_path: &Path) -> PathBuf {
    pipeline_path.with_extension("lock")
}

/// Load the params file. A missing file is an empty table.
pub fn load_params(fs: &dyn FileSystem, path: &Path) -> Result<toml::Table> {
    if !fs.exists(path) {
        return Ok(toml::Table::new());
    }
    let contents = fs.read_to_string(path)?;
    toml::from_str(&contents).map_err(|e| {
        ReprodagError::ConfigError(format!("invalid params file {}: {e}", path.display()))
    })
}

/// Look up a dotted key (`train.lr`) in a params table.
pub fn lookup_param<'a>(params: &'a toml::Table, key: &str) -> Option<&'a toml::Value> {
    let mut parts = key.split('.');
    let first = parts.next()?;
    let mut current = params.get(first)?;
    for part in parts {
        current = current.as_table()?.get(part)?;
    }
    Some(current)
}
