// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{OutputKind, StageName};

/// Top-level pipeline declaration as read from a TOML file.
///
/// ```toml
/// [config]
/// jobs = 2
///
/// [stage.prepare]
/// cmd = "python prepare.py"
/// deps = ["data/raw.csv", "prepare.py"]
/// params = ["prepare.split"]
/// outs = [{ path = "data/prepared" }]
///
/// [stage.evaluate]
/// cmd = "python evaluate.py"
/// deps = ["data/prepared"]
/// outs = [
///   { path = "scores.json", cache = false, kind = "metric" },
///   { path = "roc.json", cache = false, kind = "plot", props = { template = "linear" } },
/// ]
/// ```
///
/// All sections are optional and have reasonable defaults; validation
/// requires at least one stage.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPipelineFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All stages from `[stage.<name>]`, keyed by stage name.
    #[serde(default)]
    pub stage: BTreeMap<StageName, StageConfig>,
}

/// A validated pipeline declaration.
///
/// Only obtainable through `TryFrom<RawPipelineFile>`, which runs the checks
/// in [`crate::config::validate`].
#[derive(Debug, Clone)]
pub struct PipelineFile {
    pub config: ConfigSection,
    pub stage: BTreeMap<StageName, StageConfig>,
}

impl PipelineFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        stage: BTreeMap<StageName, StageConfig>,
    ) -> Self {
        Self { config, stage }
    }

    /// Find the stage declaring `path` as an output, by normalized path.
    pub fn find_output(&self, path: &str) -> Option<(&str, &OutConfig)> {
        let wanted = normalize_path(path);
        self.stage.iter().find_map(|(name, stage)| {
            stage
                .outs
                .iter()
                .find(|out| normalize_path(&out.path) == wanted)
                .map(|out| (name.as_str(), out))
        })
    }

    /// Every declared output with the name of its stage.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &OutConfig)> {
        self.stage
            .iter()
            .flat_map(|(name, stage)| stage.outs.iter().map(move |out| (name.as_str(), out)))
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of independent stages executed at the same time.
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Params file, relative to the pipeline root.
    #[serde(default = "default_params_file")]
    pub params_file: String,

    /// Directory holding custom plot templates, relative to the pipeline root.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

fn default_jobs() -> usize {
    1
}

fn default_params_file() -> String {
    "params.toml".to_string()
}

fn default_templates_dir() -> String {
    ".reprodag/plots".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            params_file: default_params_file(),
            templates_dir: default_templates_dir(),
        }
    }
}

/// `[stage.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    /// The command to execute, run through the platform shell.
    pub cmd: String,

    /// Files or directories the command reads.
    #[serde(default)]
    pub deps: Vec<String>,

    /// Files or directories the command writes.
    #[serde(default)]
    pub outs: Vec<OutConfig>,

    /// Dotted keys into the params file whose values this stage depends on.
    #[serde(default)]
    pub params: Vec<String>,

    /// Re-run on every reproduce, regardless of recorded state.
    #[serde(default)]
    pub always_changed: bool,

    /// Never re-run; the stage is treated as up to date.
    #[serde(default)]
    pub frozen: bool,
}

/// One entry of a stage's `outs` list.
#[derive(Debug, Clone, Deserialize)]
pub struct OutConfig {
    pub path: String,

    /// Whether the blob store keeps a copy of this output. Defaults to true.
    #[serde(default = "default_cache")]
    pub cache: bool,

    #[serde(default)]
    pub kind: OutputKind,

    /// Keep the previous output in place while the stage runs instead of
    /// removing it first.
    #[serde(default)]
    pub persist: bool,

    /// Presentational annotations. Never hashed, never written to the lock.
    #[serde(default)]
    pub props: toml::Table,
}

fn default_cache() -> bool {
    true
}

/// Normalize a declared path: forward slashes, no `.` components, no
/// trailing separator. `..` components are kept.
pub fn normalize_path(path: &str) -> String {
    use std::path::Component;

    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;
    for comp in std::path::Path::new(path.trim()).components() {
        match comp {
            Component::RootDir => absolute = true,
            Component::Prefix(p) => parts.push(p.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => parts.push("..".to_string()),
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
