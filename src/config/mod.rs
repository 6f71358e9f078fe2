// src/config/mod.rs

//! Pipeline declaration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a declaration and the params file from disk (`loader.rs`).
//! - Validate stages and graph correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    default_pipeline_path, load_and_validate, load_from_path, load_params, lock_path_for,
    lookup_param, parse_pipeline, pipeline_root,
};
pub use model::{
    normalize_path, ConfigSection, OutConfig, PipelineFile, RawPipelineFile, StageConfig,
};
pub use validate::validate_raw_pipeline;
