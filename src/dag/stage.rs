// src/dag/stage.rs

//! Execution-side view of a stage.
//!
//! `StageSpec` carries everything that decides whether a stage must re-run,
//! and nothing else. Output annotations (`props`) stay in the declaration
//! model and are only reachable through
//! [`crate::annotations::OutputAnnotationStore`].

use crate::config::model::{normalize_path, StageConfig};
use crate::hash::hash_cmd;
use crate::types::{OutputKind, StageName};

/// A declared dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepSpec {
    /// Normalized path relative to the pipeline root.
    pub path: String,
}

/// The hash facet of a declared output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutSpec {
    /// Normalized path relative to the pipeline root.
    pub path: String,
    pub cache: bool,
    pub kind: OutputKind,
    pub persist: bool,
}

/// Parsed, validated representation of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub name: StageName,
    pub cmd: String,
    pub deps: Vec<DepSpec>,
    pub outs: Vec<OutSpec>,
    pub params: Vec<String>,
    pub always_changed: bool,
    pub frozen: bool,
}

impl StageSpec {
    pub fn from_config(name: &str, cfg: &StageConfig) -> Self {
        Self {
            name: name.to_string(),
            cmd: cfg.cmd.clone(),
            deps: cfg
                .deps
                .iter()
                .map(|d| DepSpec {
                    path: normalize_path(d),
                })
                .collect(),
            outs: cfg
                .outs
                .iter()
                .map(|o| OutSpec {
                    path: normalize_path(&o.path),
                    cache: o.cache,
                    kind: o.kind,
                    persist: o.persist,
                })
                .collect(),
            params: cfg.params.clone(),
            always_changed: cfg.always_changed,
            frozen: cfg.frozen,
        }
    }

    pub fn cmd_hash(&self) -> String {
        hash_cmd(&self.cmd)
    }
}
