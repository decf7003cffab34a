// Shared helpers for the integration suites.

use std::sync::Once;

static INIT: Once = Once::new();

/// Route `log` output through the test harness. Defaults to `debug` for
/// this crate; override with RUST_LOG.
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_module("chained_collections", log::LevelFilter::Debug)
            .parse_default_env()
            .try_init();
    });
}
