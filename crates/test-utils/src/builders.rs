#![allow(dead_code)]

use std::collections::BTreeMap;

use reprodag::config::{ConfigSection, OutConfig, PipelineFile, RawPipelineFile, StageConfig};
use reprodag::errors::Result;
use reprodag::types::OutputKind;

/// Builder for `PipelineFile` to simplify test setup.
pub struct PipelineFileBuilder {
    pipeline: RawPipelineFile,
}

impl PipelineFileBuilder {
    pub fn new() -> Self {
        Self {
            pipeline: RawPipelineFile {
                config: ConfigSection::default(),
                stage: BTreeMap::new(),
            },
        }
    }

    pub fn with_stage(mut self, name: &str, stage: StageConfig) -> Self {
        self.pipeline.stage.insert(name.to_string(), stage);
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.pipeline.config.jobs = jobs;
        self
    }

    pub fn params_file(mut self, path: &str) -> Self {
        self.pipeline.config.params_file = path.to_string();
        self
    }

    /// Validate, returning the error for tests that expect one.
    pub fn try_build(self) -> Result<PipelineFile> {
        PipelineFile::try_from(self.pipeline)
    }

    pub fn build(self) -> PipelineFile {
        self.try_build()
            .expect("Failed to build valid pipeline from builder")
    }
}

impl Default for PipelineFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StageConfig`.
pub struct StageConfigBuilder {
    stage: StageConfig,
}

impl StageConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            stage: StageConfig {
                cmd: cmd.to_string(),
                deps: vec![],
                outs: vec![],
                params: vec![],
                always_changed: false,
                frozen: false,
            },
        }
    }

    pub fn dep(mut self, path: &str) -> Self {
        self.stage.deps.push(path.to_string());
        self
    }

    /// A plain cached output.
    pub fn out(self, path: &str) -> Self {
        self.out_with(OutConfigBuilder::new(path).build())
    }

    pub fn out_with(mut self, out: OutConfig) -> Self {
        self.stage.outs.push(out);
        self
    }

    pub fn param(mut self, key: &str) -> Self {
        self.stage.params.push(key.to_string());
        self
    }

    pub fn always_changed(mut self, val: bool) -> Self {
        self.stage.always_changed = val;
        self
    }

    pub fn frozen(mut self, val: bool) -> Self {
        self.stage.frozen = val;
        self
    }

    pub fn build(self) -> StageConfig {
        self.stage
    }
}

/// Builder for `OutConfig`.
pub struct OutConfigBuilder {
    out: OutConfig,
}

impl OutConfigBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            out: OutConfig {
                path: path.to_string(),
                cache: true,
                kind: OutputKind::Plain,
                persist: false,
                props: toml::Table::new(),
            },
        }
    }

    pub fn cache(mut self, val: bool) -> Self {
        self.out.cache = val;
        self
    }

    pub fn kind(mut self, kind: OutputKind) -> Self {
        self.out.kind = kind;
        self
    }

    pub fn persist(mut self, val: bool) -> Self {
        self.out.persist = val;
        self
    }

    pub fn prop(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.out.props.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> OutConfig {
        self.out
    }
}
