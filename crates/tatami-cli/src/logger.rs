//! Logging setup for the `tatami` binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber. Call once at startup.
///
/// `--verbose` wins over `--quiet`; without either, `RUST_LOG` applies and
/// falls back to info-level output for the tatami crates.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new("tatami=debug,tatami_config=debug,tatami_build=debug,tatami_server=debug,tatami_cli=debug")
    } else if quiet {
        EnvFilter::new("tatami=error,tatami_config=error,tatami_build=error,tatami_server=error,tatami_cli=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("tatami=info,tatami_config=info,tatami_build=info,tatami_server=info,tatami_cli=info")
        })
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
