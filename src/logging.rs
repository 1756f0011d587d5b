//! Tracing setup.
//!
//! Log output goes to stderr through a `tracing-subscriber` fmt layer
//! filtered by `RUST_LOG` (default `warn`). Built with the `profiling`
//! feature and run with `KDICT_TRACE=1`, spans are also written to
//! `trace.json` in Chrome trace format.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Environment variable enabling the Chrome trace layer.
pub const TRACE_ENV: &str = "KDICT_TRACE";

/// Keeps trace output alive; flushes `trace.json` on drop.
#[must_use = "dropping the guard flushes and stops the trace"]
pub struct TraceGuard {
    #[cfg(feature = "profiling")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Whether `KDICT_TRACE=1` is set.
pub fn trace_requested() -> bool {
    std::env::var(TRACE_ENV).ok().as_deref() == Some("1")
}

/// Install the global subscriber.
///
/// Returns `None` if a global subscriber is already set.
pub fn init() -> Option<TraceGuard> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter());
    let registry = tracing_subscriber::registry().with(fmt_layer);

    #[cfg(feature = "profiling")]
    let (registry, chrome) = {
        let (layer, guard) = if trace_requested() {
            let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file("trace.json")
                .build();
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };
        (registry.with(layer), guard)
    };

    if tracing::subscriber::set_global_default(registry).is_err() {
        return None;
    }

    Some(TraceGuard {
        #[cfg(feature = "profiling")]
        _chrome: chrome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_once() {
        let first = init();
        assert!(first.is_some());
        assert!(init().is_none());
        tracing::info!("subscriber installed");
    }
}
