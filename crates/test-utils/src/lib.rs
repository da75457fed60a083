pub mod builders;
pub mod fake_repo;
pub mod local_session;
pub mod scripted_runner;
pub mod simulated_host;

pub use builders::ConfigFileBuilder;
pub use fake_repo::{FakeRemote, FakeRepository};
pub use local_session::LocalSession;
pub use scripted_runner::ScriptedRunner;
pub use simulated_host::SimulatedHost;

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt};

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
