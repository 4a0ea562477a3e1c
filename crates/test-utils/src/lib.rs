pub mod buffers;

use std::io::Write;
use std::sync::Once;

use tempfile::NamedTempFile;
use tracing_subscriber::{EnvFilter, fmt};

pub use buffers::SharedBuffer;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
///
/// Child processes that hang (e.g. a pipe left open by mistake) show up as a
/// timeout instead of a stuck test run.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// Write `contents` to a fresh temporary TOML file.
pub fn defaults_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp defaults file");
    file.write_all(contents.as_bytes())
        .expect("write temp defaults file");
    file
}

/// Parse a TOML snippet into a table, for keyed option tests.
pub fn toml_table(contents: &str) -> procexec::Result<toml::Table> {
    Ok(toml::from_str(contents)?)
}
