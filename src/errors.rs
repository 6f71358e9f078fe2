// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReprodagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML document error: {0}")]
    TomlEditError(#[from] toml_edit::TomlError),

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Cycle detected in pipeline: {0}")]
    CyclicGraph(String),

    #[error("output '{path}' is produced by both '{first}' and '{second}'")]
    AmbiguousOutput {
        path: String,
        first: String,
        second: String,
    },

    #[error("path does not exist: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("stage '{stage}' depends on missing path '{path}'")]
    MissingDependency { stage: String, path: String },

    #[error("stage '{stage}' references unknown param '{key}'")]
    MissingParam { stage: String, key: String },

    #[error("stage '{stage}' did not produce declared output '{path}'")]
    MissingOutput { stage: String, path: String },

    #[error("stage '{stage}' failed with exit code {exit_code}: {cmd}")]
    StageFailed {
        stage: String,
        cmd: String,
        exit_code: i32,
    },

    #[error("Output not found in pipeline: {0}")]
    OutputNotFound(String),

    #[error("properties not found on '{path}': {}", .keys.join(", "))]
    PropsNotFound { path: String, keys: Vec<String> },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Interrupted before the pipeline finished")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ReprodagError>;
