// ABOUTME: Test support utilities.
// ABOUTME: Provides the in-memory engine, project fixtures and tracing init.

use std::path::Path;
use std::sync::Once;

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod fake_runtime;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("exoframe=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Temporary project directory holding `files` as `(name, contents)`.
#[allow(dead_code)]
pub fn project_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), files);
    dir
}

#[allow(dead_code)]
pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}
