//! Logging setup for pipelines that embed fob-stream.
//!
//! Only available with the `logging` feature. Without it the crate just
//! emits `tracing` events and leaves the subscriber to the application.

use std::fmt;
use std::str::FromStr;
use std::sync::Once;

use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Verbosity of fob-stream's own events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Silent,
    Error,
    /// Stale cache writes, missing or replaced source maps, ignored options
    Warn,
    /// One line per bundled file
    #[default]
    Info,
    /// Cache hits and every generate call
    Debug,
}

impl LogLevel {
    fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }

    /// Directive scoped to this crate's events, e.g. `fob_stream=debug`.
    fn directive(self) -> Directive {
        format!("{}={}", env!("CARGO_CRATE_NAME"), self)
            .parse()
            .unwrap_or_else(|_| self.level_filter().into())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Accepts tracing's level names plus `silent` and `warning`. `trace`
    /// is clamped to `debug`, the most verbose level this crate emits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = match s.to_ascii_lowercase().as_str() {
            "silent" => "off".to_string(),
            "warning" => "warn".to_string(),
            other => other.to_string(),
        };
        let filter = LevelFilter::from_str(&normalized)
            .map_err(|_| format!("Invalid log level: {}", s))?;
        Ok(match filter {
            LevelFilter::OFF => LogLevel::Silent,
            LevelFilter::ERROR => LogLevel::Error,
            LevelFilter::WARN => LogLevel::Warn,
            LevelFilter::INFO => LogLevel::Info,
            _ => LogLevel::Debug,
        })
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // LevelFilter prints upper case ("DEBUG"); keep the RUST_LOG spelling.
        f.write_str(&self.level_filter().to_string().to_ascii_lowercase())
    }
}

fn install(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_target(false).without_time())
        .init();
}

/// Install a global subscriber showing fob-stream events at `level`.
///
/// Only the first call in a process has an effect. `RUST_LOG` directives
/// are still honoured for other crates.
///
/// ```rust,no_run
/// use fob_stream::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Debug);
/// ```
pub fn init_logging(level: LogLevel) {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive(level.directive());
        install(filter);
    });
}

/// Install a global subscriber configured from `RUST_LOG`.
///
/// Falls back to `fob_stream=info` if `RUST_LOG` is unset or invalid.
pub fn init_logging_from_env() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::default().add_directive(LogLevel::default().directive()));
        install(filter);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("off".parse::<LogLevel>().unwrap(), LogLevel::Silent);
        assert_eq!("silent".parse::<LogLevel>().unwrap(), LogLevel::Silent);
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_directive_is_scoped_to_crate() {
        assert_eq!(
            LogLevel::Debug.directive().to_string().to_ascii_lowercase(),
            "fob_stream=debug"
        );
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Silent.to_string(), "off");
    }
}
