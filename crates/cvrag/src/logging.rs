//! Structured logging setup for the `cvrag` binary.
//!
//! Events go to stderr so stdout stays clean for context output that is
//! piped into a prompt. `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "cvrag=debug,cvrag_core=debug"
    } else {
        "cvrag=info,cvrag_core=info"
    }
}

/// Install the global subscriber. Call once, before any command runs.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // A second init (tests embedding the library) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        for verbose in [false, true] {
            assert!(default_filter(verbose).parse::<EnvFilter>().is_ok());
        }
    }
}
