#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use reprodag::config::PipelineFile;
use reprodag::dag::Pipeline;
use reprodag::exec::ExecutorBackend;
use reprodag::fs::{FileSystem, RealFileSystem};
use reprodag::lock::FileLockStore;
use reprodag::repro::Reproducer;

pub use reprodag_test_utils::{init_tracing, read_file, with_timeout, write_file};

pub const LOCK_FILE: &str = "reprodag.lock";
pub const PIPELINE_FILE: &str = "reprodag.toml";

/// A reproducer over `file`, rooted at `root`, with the lock on disk.
pub fn reproducer_in<E: ExecutorBackend + 'static>(
    root: &Path,
    file: &PipelineFile,
    executor: E,
) -> Reproducer<FileLockStore, E> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let pipeline = Pipeline::from_file(root, root.join(LOCK_FILE), file)
        .expect("pipeline should build");
    let lock = FileLockStore::new(fs.clone(), root.join(LOCK_FILE));
    Reproducer::new(pipeline, fs, lock, executor)
}

/// A reproducer over the declaration written at `root/reprodag.toml`.
pub fn reproducer_from_disk<E: ExecutorBackend + 'static>(
    root: &Path,
    executor: E,
) -> Reproducer<FileLockStore, E> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let pipeline =
        Pipeline::load(fs.as_ref(), &root.join(PIPELINE_FILE)).expect("pipeline should load");
    let lock = FileLockStore::new(fs.clone(), pipeline.lock_path());
    Reproducer::new(pipeline, fs, lock, executor)
}
