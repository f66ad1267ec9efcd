//! Tracing setup for the `ama` binary.
//!
//! Logs always go to stderr: stdout carries only the session result JSON.
//! The filter comes from `AMA_LOG`, then `RUST_LOG`, then the CLI verbosity.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Filter variable read before `RUST_LOG`.
pub const LOG_ENV: &str = "AMA_LOG";

/// HTTP stack targets kept at `warn` unless a filter is set explicitly.
const QUIET_TARGETS: [&str; 4] = ["hyper", "hyper_util", "reqwest", "h2"];

/// Filter directives for the given environment values and fallback level.
/// Blank values count as unset.
pub fn filter_directives(ama_log: Option<&str>, rust_log: Option<&str>, level: Level) -> String {
    let explicit = [ama_log, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty());
    if let Some(directives) = explicit {
        return directives.to_string();
    }

    let mut directives = level.as_str().to_ascii_lowercase();
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

fn env_filter(level: Level) -> EnvFilter {
    let ama_log = std::env::var(LOG_ENV).ok();
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(ama_log.as_deref(), rust_log.as_deref(), level);
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber. `json` switches to one JSON object per line
/// with the `ama.session` span fields attached. Later calls are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let base = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let output: Box<dyn Layer<Registry> + Send + Sync> = if json {
        base.json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        base.with_ansi(std::io::stderr().is_terminal()).boxed()
    };

    tracing_subscriber::registry()
        .with(output)
        .with(env_filter(level))
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ama_log_wins_over_rust_log() {
        assert_eq!(
            filter_directives(Some("ama_core=trace"), Some("debug"), Level::INFO),
            "ama_core=trace"
        );
        assert_eq!(filter_directives(None, Some("debug"), Level::INFO), "debug");
        assert_eq!(filter_directives(Some("  "), Some("warn"), Level::INFO), "warn");
    }

    #[test]
    fn test_default_quiets_http_stack() {
        let directives = filter_directives(None, None, Level::DEBUG);
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(true, Level::INFO);
        init_tracing(false, Level::DEBUG);
    }
}
