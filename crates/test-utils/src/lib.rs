pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{OutConfigBuilder, PipelineFileBuilder, StageConfigBuilder};
pub use fake_executor::FakeExecutor;

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Output is captured by the harness and shown only for failing tests
/// (or with `--nocapture`). The filter comes from `RUST_LOG`, e.g.
/// `RUST_LOG=reprodag::repro=debug`, and defaults to `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Upper bound for a single pipeline run in tests.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Await `f`, panicking if it outlives [`RUN_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(RUN_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("run did not finish within {RUN_TIMEOUT:?}"),
    }
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Read `root/rel` as a string.
pub fn read_file(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}
