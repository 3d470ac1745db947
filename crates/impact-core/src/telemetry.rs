//! Tracing setup for the `impact` binary.
//!
//! Logs go to stderr so the console summary on stdout stays clean.
//! `RUST_LOG` overrides the default level.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber, as newline-delimited JSON when `json` is
/// set. `level` applies when `RUST_LOG` is absent or unparsable.
///
/// Returns `false` if a subscriber was already installed; the existing one
/// is left in place.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        init_tracing(false, Level::DEBUG);
        assert!(!init_tracing(true, Level::INFO));
        assert!(tracing::dispatcher::has_been_set());
    }
}
