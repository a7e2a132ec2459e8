//! Diagnostic output for the recorder.
//!
//! Everything goes to stderr. Stdout carries bridge events, so nothing here may
//! write to it.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How chatty the recorder is, as chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// `-q`: errors only.
    Quiet,
    /// Dumps, acknowledgements and lifecycle events.
    #[default]
    Normal,
    /// `-v`: adds bus subscriptions and snapshot details.
    Verbose,
    /// `-vv`: adds every tick and signal update.
    Trace,
}

impl Verbosity {
    /// Most detailed level emitted at this verbosity.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directive used when `RUST_LOG` isn't set.
    #[must_use]
    pub fn directive(&self) -> String {
        format!("crashrecorder={}", self.to_level_filter())
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `verbosity` when set. Colors are only used when stderr
/// is a terminal. Calling this more than once is harmless; later calls are
/// ignored.
///
/// ```no_run
/// use crashrecorder::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(true),
    );

    let _ = subscriber.try_init();
}

/// Route warnings and errors into the test harness output.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
