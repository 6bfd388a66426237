#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Shared test setup.
//!
//! Call [`setup`] at the start of a test to get tracing output (filtered by
//! the `KEEL_LOG` environment variable) captured with the test's output.
//! Initialization happens at most once per process, so every test can call it
//! unconditionally.

use std::sync::LazyLock;

use tracing_subscriber::filter::LevelFilter;

static SUBSCRIBER_INIT: LazyLock<()> = LazyLock::new(|| {
    let filter = std::env::var("KEEL_LOG")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::WARN);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_test_writer()
        .init();
});

/// Install the global tracing subscriber, once.
pub fn setup() {
    let _ = *SUBSCRIBER_INIT;
}
