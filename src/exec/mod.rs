// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running stage commands, using
//! `tokio::process::Command`, and reporting their exit status back to the
//! reproducer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait that the reproducer
//!   drives, and which tests can replace with a fake implementation.
//! - [`shell`] is the production backend running commands through the
//!   platform shell.

pub mod backend;
pub mod shell;

pub use backend::{ExecutorBackend, StageFuture, StageJob};
pub use shell::ShellExecutor;
