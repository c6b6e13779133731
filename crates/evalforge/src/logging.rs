//! Log output for applications embedding EvalForge.
//!
//! All crates log through `tracing`:
//!
//! - **INFO**: conformance summaries
//! - **WARN**: conformance failures
//! - **DEBUG**: compilation and interpreter setup
//! - **TRACE**: generated IR and parallel tensor work
//!
//! The level is taken from `RUST_LOG` when set.

use std::sync::OnceLock;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();

/// Installs a formatted `tracing` subscriber at INFO.
///
/// Safe to call multiple times - only the first call has effect. Does
/// nothing if another global subscriber is already installed.
pub fn init() {
    init_with_level(LevelFilter::INFO);
}

/// Like [`init`], with a different default level.
pub fn init_with_level(level: LevelFilter) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init();
    });
}

/// True once [`init`] or [`init_with_level`] has run.
pub fn is_initialized() -> bool {
    INIT.get().is_some()
}
