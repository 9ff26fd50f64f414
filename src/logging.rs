//! Tracing subscriber setup

use crate::cli::Verbosity;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter from `RUST_LOG`, or from the verbosity flags when unset
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("cyclekeeper={},warn", verbosity.log_level()))
    })
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbosity: Verbosity, json: bool) {
    let filter = env_filter(verbosity);

    let result = if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(false))
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init(Verbosity::Quiet, false);
        init(Verbosity::Verbose, true);
    }
}
