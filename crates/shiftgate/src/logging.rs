//! Diagnostics for the gateway and the CLI.
//!
//! Everything goes to stderr through `tracing`, so `--json` output on stdout
//! can be piped without log lines mixed in. Backend tokens are never logged;
//! only the masked prefix from [`crate::config::mask_token`] appears.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much the CLI reports about its own work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings, such as an unconfigured backend or skipped records.
    #[default]
    Normal,
    /// Per-request debug lines.
    Verbose,
    /// Everything, including the HTTP client's own events.
    Trace,
}

impl Verbosity {
    /// Map `-q` and the `-v` count to a level. `-q` wins.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Level applied to this crate's events.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    ///
    /// Dependencies stay silent except at [`Verbosity::Trace`], where
    /// `reqwest` is let through at debug.
    #[must_use]
    pub fn directive(&self) -> String {
        let own = format!("shiftgate={}", self.to_level_filter());
        match self {
            Self::Trace => format!("{own},reqwest=debug"),
            _ => own,
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Safe to call more than once; later calls are no-ops.
///
/// ```no_run
/// use shiftgate::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // Another subscriber may already be installed
    let _ = subscriber.try_init();
}

/// Capture this crate's warnings in test output.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("shiftgate=warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 5), Verbosity::Trace);
    }

    #[test]
    fn test_directive() {
        assert_eq!(Verbosity::Normal.directive(), "shiftgate=WARN");
        assert_eq!(Verbosity::Verbose.directive(), "shiftgate=DEBUG");
        assert_eq!(
            Verbosity::Trace.directive(),
            "shiftgate=TRACE,reqwest=debug"
        );
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }
}
