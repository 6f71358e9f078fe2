// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::loader::DEFAULT_PIPELINE_FILE;

/// Command-line arguments for `reprodag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "reprodag",
    version,
    about = "Reproduce pipeline stages whose inputs changed.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline declaration (TOML).
    ///
    /// Default: `reprodag.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_PIPELINE_FILE)]
    pub file: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REPRODAG_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every stale stage (of TARGETS and their ancestors, if given).
    Repro {
        #[arg(value_name = "TARGETS")]
        targets: Vec<String>,

        /// Maximum number of stages running at once. Overrides `[config] jobs`.
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,

        /// Print what would run, and why, without running anything.
        #[arg(long)]
        dry: bool,
    },

    /// Show stale stages and why they are stale.
    Status {
        #[arg(value_name = "TARGETS")]
        targets: Vec<String>,
    },

    /// Set or unset annotations of a declared output.
    Modify {
        #[arg(value_name = "OUTPUT")]
        output: String,

        /// `key=value`; the value is read as TOML, falling back to a string.
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        set: Vec<(String, toml::Value)>,

        #[arg(long = "unset", value_name = "KEY")]
        unset: Vec<String>,
    },

    /// Show annotations: of every output, or those that apply to PATH.
    Props {
        #[arg(value_name = "PATH")]
        path: Option<String>,
    },

    /// Print stages in execution order with their upstream stages.
    Dag,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Parse `key=value` for `--set`.
pub fn parse_key_value(raw: &str) -> Result<(String, toml::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), parse_value(value.trim())))
}

fn parse_value(raw: &str) -> toml::Value {
    format!("v = {raw}")
        .parse::<toml::Table>()
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
