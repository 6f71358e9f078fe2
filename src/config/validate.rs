// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{normalize_path, PipelineFile, RawPipelineFile};
use crate::dag::{DependencyGraph, StageSpec};
use crate::errors::{ReprodagError, Result};

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = crate::errors::ReprodagError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_pipeline(&raw)?;
        Ok(PipelineFile::new_unchecked(raw.config, raw.stage))
    }
}

/// Run every validation check against a raw declaration.
pub fn validate_raw_pipeline(cfg: &RawPipelineFile) -> Result<()> {
    ensure_has_stages(cfg)?;
    validate_global_config(cfg)?;
    validate_stages(cfg)?;
    validate_graph(cfg)?;
    Ok(())
}

fn ensure_has_stages(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.stage.is_empty() {
        return Err(ReprodagError::ConfigError(
            "pipeline must contain at least one [stage.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.config.jobs == 0 {
        return Err(ReprodagError::ConfigError(
            "[config].jobs must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.config.params_file.trim().is_empty() {
        return Err(ReprodagError::ConfigError(
            "[config].params_file must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_stages(cfg: &RawPipelineFile) -> Result<()> {
    for (name, stage) in cfg.stage.iter() {
        if name.trim().is_empty() || name.contains(char::is_whitespace) {
            return Err(ReprodagError::ConfigError(format!(
                "invalid stage name '{}': names must be non-empty and contain no whitespace",
                name
            )));
        }

        if stage.cmd.trim().is_empty() {
            return Err(ReprodagError::ConfigError(format!(
                "stage '{}' has an empty `cmd`",
                name
            )));
        }

        for dep in stage.deps.iter() {
            if normalize_path(dep) == "." {
                return Err(ReprodagError::ConfigError(format!(
                    "stage '{}' declares the pipeline root as a dependency",
                    name
                )));
            }
        }

        let mut seen = HashSet::new();
        for out in stage.outs.iter() {
            let path = normalize_path(&out.path);
            if path == "." || path.starts_with('/') || path.split('/').any(|c| c == "..") {
                return Err(ReprodagError::ConfigError(format!(
                    "stage '{}' has output '{}' outside the pipeline root",
                    name, out.path
                )));
            }
            if !seen.insert(path.clone()) {
                return Err(ReprodagError::ConfigError(format!(
                    "stage '{}' declares output '{}' more than once",
                    name, path
                )));
            }
        }

        for key in stage.params.iter() {
            if key.trim().is_empty() || key.split('.').any(str::is_empty) {
                return Err(ReprodagError::ConfigError(format!(
                    "stage '{}' has malformed param key '{}'",
                    name, key
                )));
            }
        }
    }
    Ok(())
}

fn validate_graph(cfg: &RawPipelineFile) -> Result<()> {
    let specs: Vec<StageSpec> = cfg
        .stage
        .iter()
        .map(|(name, stage)| StageSpec::from_config(name, stage))
        .collect();

    // Cycles and ambiguous producers surface here as structured errors.
    DependencyGraph::build(&specs)?;
    Ok(())
}
