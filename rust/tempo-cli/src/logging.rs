//! Diagnostic logging for the Tempo binaries.
//!
//! Logs go to stderr so stdout carries nothing but results. The filter is
//! read from `TEMPO_LOG` using `tracing-subscriber`'s directive syntax, e.g.
//! `TEMPO_LOG=tempo_codegen=debug`.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "TEMPO_LOG";

/// Directives used when `TEMPO_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVES: &str = "warn";

/// Build the filter for `directives`, falling back to [`DEFAULT_DIRECTIVES`].
pub fn filter_for(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init() {
    let directives = std::env::var(LOG_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(directives.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
