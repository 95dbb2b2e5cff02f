//! Logging setup for the demo binary (SPEC_FULL §4.11, AS3).
//!
//! Grounded in `ai-llm-service::telemetry`: a crate-scoped `tracing-subscriber`
//! filter layer with RFC3339 timestamps. The core library itself only emits
//! `tracing` events; it never installs a subscriber — that is left to
//! whatever binary embeds it, exactly as the teacher's library crates do.

use std::io::{self, IsTerminal};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

/// Crate target prefix used to filter only library-originated logs.
pub const TARGET_PREFIX: &str = "js_url_extract";

/// RFC3339 UTC timer implemented via `chrono` (no extra subscriber features).
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        let s = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Install a global subscriber for the demo binary: compact single-line
/// events, RFC3339 timestamps, `RUST_LOG`-driven filtering falling back to
/// `info` for this crate.
pub fn init() {
    let use_ansi = io::stdout().is_terminal();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{TARGET_PREFIX}=info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoRfc3339Utc::default())
        .with_target(true)
        .with_ansi(use_ansi)
        .compact()
        .init();
}
