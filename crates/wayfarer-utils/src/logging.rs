//! Tracing setup and span helpers.

use std::io::IsTerminal;
use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Build the filter used by [`init_tracing`].
///
/// `RUST_LOG` wins when set and parseable. Otherwise wayfarer crates log at
/// `info` (or `debug` when `verbose`) and everything else at `warn`.
#[must_use]
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("wayfarer=debug,tower_http=debug,warn")
            } else {
                EnvFilter::try_new("wayfarer=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// Output goes to stderr so `wayfarer generate` can keep stdout for NDJSON.
/// Verbose mode adds targets and span close events (which carry timings).
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = env_filter(verbose);

    if verbose {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span wrapping one generator invocation.
///
/// `records` and `duration_ms` start empty and are recorded on completion.
#[must_use]
pub fn generation_span(generator: &str, requests: usize) -> tracing::Span {
    span!(
        Level::INFO,
        "generation",
        generator = %generator,
        requests = requests,
        records = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_span_accepts_late_fields() {
        let span = generation_span("reference", 3);
        span.record("records", 3);
        span.record("duration_ms", 12_u64);
    }

    #[test]
    fn env_filter_builds_in_both_modes() {
        let _ = env_filter(false);
        let _ = env_filter(true);
    }
}
