//! Tracing initialisation for the `odfix` binary.
//!
//! Call [`init_tracing`] once at program start. Repeated calls are ignored
//! because the global subscriber can only be set once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the requested level; everything else is
/// capped at `warn`.
const ODFIX_TARGETS: &[&str] = &["odfix", "odfix_core", "odfix_runner", "odfix_source"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(ODFIX_TARGETS.iter().map(|t| format!("{t}={}", level.as_str().to_lowercase())));
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// `json` switches stderr text output to newline-delimited JSON on stdout,
/// for collection alongside result files.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    // already initialised
    result.ok();
}
