//! Tracing setup
//!
//! Logs go to stderr so answers on stdout stay clean. `RUST_LOG` wins over
//! the `-v` count when set.

use tracing_subscriber::EnvFilter;

pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbosity));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_filter(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}
