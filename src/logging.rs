//! Diagnostics via `tracing`, written to stderr.
//!
//! Command results go to stdout through `main::output`; everything here is for
//! watching a run in flight. `RUST_LOG` wins when set; otherwise `--verbose`
//! selects `info` (per-repository steps) and the default is `warn`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
