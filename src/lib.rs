// src/lib.rs

pub mod annotations;
pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod hash;
pub mod lock;
pub mod logging;
pub mod repro;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::annotations::OutputAnnotationStore;
use crate::cli::{CliArgs, Command};
use crate::dag::Pipeline;
use crate::errors::{ReprodagError, Result};
use crate::exec::ShellExecutor;
use crate::fs::{FileSystem, RealFileSystem};
use crate::lock::FileLockStore;
use crate::repro::Reproducer;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - declaration loading
/// - lock store and executor
/// - the reproducer or the annotation store, per subcommand
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let pipeline_path = PathBuf::from(&args.file);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    match args.command {
        Command::Repro { targets, jobs, dry } => {
            let mut reproducer = build_reproducer(fs, &pipeline_path)?;
            if let Some(jobs) = jobs {
                reproducer = reproducer.with_jobs(jobs);
            }

            if dry {
                print_status(&reproducer, &targets)?;
                return Ok(());
            }

            // Ctrl-C drops the run; children are killed with it and entries
            // committed so far stay in the lock.
            tokio::select! {
                report = reproducer.reproduce(&targets) => {
                    let report = report?;
                    if report.executed.is_empty() {
                        println!("Pipeline is up to date.");
                    } else {
                        for stage in report.executed.iter() {
                            println!("ran {stage}");
                        }
                    }
                    Ok(())
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("interrupted; stopping running stages");
                    Err(ReprodagError::Interrupted)
                }
            }
        }

        Command::Status { targets } => {
            let reproducer = build_reproducer(fs, &pipeline_path)?;
            print_status(&reproducer, &targets)
        }

        Command::Modify { output, set, unset } => {
            let store = OutputAnnotationStore::new(fs, &pipeline_path);
            let set: toml::Table = set.into_iter().collect();
            store.modify(&output, &set, &unset)
        }

        Command::Props { path } => {
            let store = OutputAnnotationStore::new(fs, &pipeline_path);
            match path {
                Some(path) => match store.effective_props(&path)? {
                    Some(props) => print_props(&path, &props),
                    None => return Err(ReprodagError::OutputNotFound(path)),
                },
                None => {
                    for (out, props) in store.declared()? {
                        print_props(&out, &props);
                    }
                }
            }
            Ok(())
        }

        Command::Dag => {
            let pipeline = Pipeline::load(fs.as_ref(), &pipeline_path)?;
            print_dag(&pipeline);
            Ok(())
        }
    }
}

fn build_reproducer(
    fs: Arc<dyn FileSystem>,
    pipeline_path: &std::path::Path,
) -> Result<Reproducer<FileLockStore, ShellExecutor>> {
    let pipeline = Pipeline::load(fs.as_ref(), pipeline_path)?;
    let lock = FileLockStore::new(fs.clone(), pipeline.lock_path());
    debug!(lock = %pipeline.lock_path().display(), "using lock file");
    Ok(Reproducer::new(pipeline, fs, lock, ShellExecutor::new()))
}

fn print_status(
    reproducer: &Reproducer<FileLockStore, ShellExecutor>,
    targets: &[String],
) -> Result<()> {
    let statuses = reproducer.status(targets)?;
    if statuses.is_empty() {
        println!("Pipeline is up to date.");
    }
    for status in statuses {
        println!("{status}");
    }
    Ok(())
}

fn print_props(path: &str, props: &toml::Table) {
    if props.is_empty() {
        println!("{path}: (none)");
        return;
    }
    let rendered: Vec<String> = props.iter().map(|(k, v)| format!("{k} = {v}")).collect();
    println!("{path}: {}", rendered.join(", "));
}

/// Print stages in execution order with their upstream stages.
fn print_dag(pipeline: &Pipeline) {
    let graph = pipeline.graph();
    println!("stages ({}):", graph.topo_order().len());
    for name in graph.stages() {
        println!("  - {name}");
        let deps = graph.dependencies_of(name);
        if !deps.is_empty() {
            println!("      after: {}", deps.join(", "));
        }
        if let Some(stage) = pipeline.stage(name) {
            println!("      cmd: {}", stage.cmd);
        }
    }
}
