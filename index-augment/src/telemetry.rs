use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

/// Targets rendered by [`layer`]: the augmentation core, the encoder client
/// and the binary.
pub const TARGET_PREFIXES: [&str; 3] = ["index_augment", "embed_service", "semantic_indexer"];

/// RFC3339 UTC timer, e.g. `2025-09-12T10:20:30Z`.
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let s = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

fn is_ours(target: &str) -> bool {
    TARGET_PREFIXES.iter().any(|p| target.starts_with(p))
}

/// Formatting layer for this workspace's events only.
///
/// Compact single line with timestamp, level, target and `file:line`. Span
/// close events carry durations of instrumented store calls. Colors only on
/// a terminal. Logs go to stderr so the JSON report on stdout stays clean.
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = io::stderr().is_terminal();

    fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_timer(ChronoRfc3339Utc)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(use_ansi)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_filter(filter::filter_fn(|meta| is_ours(meta.target())))
}

/// `index_augment=<level>` style directives for every workspace target.
pub fn level_directives(level: Level) -> Vec<Directive> {
    let level = level.as_str().to_lowercase();
    TARGET_PREFIXES
        .iter()
        .filter_map(|t| format!("{t}={level}").parse().ok())
        .collect()
}

/// `RUST_LOG` if set, else `default`; then `level` for this workspace.
pub fn env_filter_with_level(default: &str, level: Level) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    level_directives(level)
        .into_iter()
        .fold(base, |f, d| f.add_directive(d))
}
