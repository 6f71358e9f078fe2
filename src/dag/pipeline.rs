// src/dag/pipeline.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{load_and_validate, lock_path_for, pipeline_root, ConfigSection, PipelineFile};
use crate::dag::graph::DependencyGraph;
use crate::dag::stage::StageSpec;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::StageName;

/// A loaded pipeline: execution-side stage specs plus their graph.
#[derive(Debug, Clone)]
pub struct Pipeline {
    root: PathBuf,
    lock_path: PathBuf,
    config: ConfigSection,
    stages: BTreeMap<StageName, StageSpec>,
    graph: DependencyGraph,
}

impl Pipeline {
    /// Read, parse and validate the declaration at `path`.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let file = load_and_validate(fs, path)?;
        Self::from_file(pipeline_root(path), lock_path_for(path), &file)
    }

    pub fn from_file(
        root: impl Into<PathBuf>,
        lock_path: impl Into<PathBuf>,
        file: &PipelineFile,
    ) -> Result<Self> {
        let stages: BTreeMap<StageName, StageSpec> = file
            .stage
            .iter()
            .map(|(name, cfg)| (name.clone(), StageSpec::from_config(name, cfg)))
            .collect();
        let specs: Vec<StageSpec> = stages.values().cloned().collect();
        let graph = DependencyGraph::build(&specs)?;

        let root = root.into();
        debug!(root = %root.display(), stages = stages.len(), "loaded pipeline");

        Ok(Self {
            root,
            lock_path: lock_path.into(),
            config: file.config.clone(),
            stages,
            graph,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.get(name)
    }

    pub fn stages(&self) -> impl Iterator<Item = &StageSpec> {
        self.stages.values()
    }

    pub fn params_path(&self) -> PathBuf {
        self.root.join(&self.config.params_file)
    }
}
