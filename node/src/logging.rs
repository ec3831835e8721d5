//! # Structured Logging
//!
//! One `tracing` subscriber for the whole process, filtered by `RUST_LOG`
//! and falling back to [`DEFAULT_DIRECTIVES`]. Record appends, admission
//! transitions and request traces all flow through it.
//!
//! Everything is written to stderr: `sign`, `keygen` and `verify-chain`
//! print their results on stdout and must stay pipeable.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "notary_node=info,notary_protocol=info,tower_http=debug";

/// Output format selected by `--log-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored, multi-field lines with source locations.
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// `"json"` in any case selects JSON; anything else falls back to pretty.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Install the global subscriber.
///
/// Fails if one is already installed, which only happens when called twice.
///
/// ```text
/// RUST_LOG=notary_protocol=debug notary-node run   # admission transitions
/// ```
pub fn init_logging(default_directives: &str, format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    // Exactly one of the two layers is present; `Option<Layer>` is a no-op
    // layer when `None`.
    let (pretty, json) = match format {
        LogFormat::Pretty => (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()?;

    tracing::debug!(?format, directives = default_directives, "logging ready");
    Ok(())
}
