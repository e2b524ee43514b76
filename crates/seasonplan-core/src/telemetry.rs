//! Log output for the `seasonplan` binary and other hosts of the engine.
//!
//! Planning runs print their results on stdout, so every log line goes to
//! stderr. Without `RUST_LOG` only the engine's own targets log at the
//! requested level; dependencies stay at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const ENGINE_TARGETS: [&str; 2] = ["seasonplan_core", "seasonplan"];

fn default_directives(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(ENGINE_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.join(",")
}

/// Install the global subscriber. Only the first call per process wins.
///
/// `json` switches to newline-delimited JSON, one object per season event.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}
