#![forbid(unsafe_code)]

//! Log output for applications embedding formwork.
//!
//! The engine only emits `tracing` events. [`init`] installs a formatted
//! stderr subscriber filtered by `FORMWORK_LOG` (default `warn`), for
//! applications that do not set up their own.

use std::fmt;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding filter directives (`debug`,
/// `formwork_core=debug,warn`, ...).
pub const ENV_LOG: &str = "FORMWORK_LOG";

/// Directives used when `FORMWORK_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVES: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// Another global subscriber is already installed.
    SubscriberAlreadySet,
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberAlreadySet => write!(f, "a global tracing subscriber is already set"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Install the subscriber using `FORMWORK_LOG`.
///
/// Calling it again, or after another subscriber was installed, returns
/// [`LoggingError::SubscriberAlreadySet`] and changes nothing.
pub fn init() -> Result<(), LoggingError> {
    let directives = std::env::var(ENV_LOG).ok();
    init_with(directives.as_deref())
}

/// Install the subscriber with explicit directives (`None` = default).
pub fn init_with(directives: Option<&str>) -> Result<(), LoggingError> {
    tracing_subscriber::registry()
        .with(filter(directives))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|_| LoggingError::SubscriberAlreadySet)
}

/// Build the filter for `directives`, falling back to [`DEFAULT_DIRECTIVES`].
#[must_use]
pub fn filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_falls_back_to_default() {
        assert_eq!(filter(None).to_string(), DEFAULT_DIRECTIVES);
        assert_eq!(filter(Some("  ")).to_string(), DEFAULT_DIRECTIVES);
        assert_eq!(filter(Some("formwork_core=loud")).to_string(), DEFAULT_DIRECTIVES);
    }

    #[test]
    fn filter_accepts_directives() {
        assert_eq!(filter(Some("debug")).to_string(), "debug");
    }

    #[test]
    fn second_init_is_harmless() {
        let first = init_with(Some("debug"));
        let second = init_with(Some("debug"));
        // Another test in this binary may have installed one first.
        assert!(first.is_ok() || first == Err(LoggingError::SubscriberAlreadySet));
        assert_eq!(second, Err(LoggingError::SubscriberAlreadySet));
    }
}
