//! Routing of `PuzzleKit` log output to a host logger.
//!
//! Library code logs through `tracing`. When no `tracing` subscriber is
//! installed those events surface as `log` records, and [`set_logger`] sends
//! them on to a host [`Logger`]: the app's own logging system on mobile, or a
//! stderr writer in the CLI.

use std::sync::{Arc, OnceLock};

/// Receives the log output of this crate.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use puzzlekit_core::logger::{set_logger_with_level, LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("{level} {message}");
///     }
/// }
///
/// set_logger_with_level(Arc::new(StderrLogger), LogLevel::Info);
/// ```
///
/// ## Swift
///
/// ```swift
/// final class ProgressLog: PuzzleKit.Logger {
///     func log(level: PuzzleKit.LogLevel, message: String) {
///         os_log("%{public}@", type: level.osLogType, message)
///     }
/// }
///
/// PuzzleKit.setLogger(logger: ProgressLog()) // once, at startup
/// ```
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait Logger: Sync + Send {
    /// Logs `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LogLevel {
    /// Very detailed tracing, e.g. suppressed duplicate auth notifications.
    Trace,
    /// Debugging information.
    Debug,
    /// Identity transitions and granted rewards.
    Info,
    /// Degraded operation, such as memory-only guest progress.
    Warn,
    /// Failures.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

impl LogLevel {
    const fn as_filter(self) -> log::LevelFilter {
        match self {
            Self::Trace => log::LevelFilter::Trace,
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warn => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

/// `log` backend forwarding to a host [`Logger`].
///
/// Records from this crate (and the CLI) pass from `min_level` up. Dependencies
/// such as reqwest and hyper are held to `Info` or above.
struct HostLogger {
    sink: Arc<dyn Logger>,
    min_level: LogLevel,
}

impl HostLogger {
    fn accepts(&self, level: LogLevel, target: &str) -> bool {
        let floor = if target.starts_with("puzzlekit") {
            self.min_level
        } else {
            self.min_level.max(LogLevel::Info)
        };
        level >= floor
    }
}

impl log::Log for HostLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.accepts(metadata.level().into(), metadata.target())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.sink.log(
            record.level().into(),
            format!("{}: {}", record.target(), record.args()),
        );
    }

    fn flush(&self) {}
}

static HOST_LOGGER: OnceLock<HostLogger> = OnceLock::new();

/// Sets the global logger, forwarding everything from `Debug` up.
///
/// Only the first call has an effect; later calls are reported on stderr and
/// ignored.
#[cfg_attr(feature = "ffi", uniffi::export)]
pub fn set_logger(logger: Arc<dyn Logger>) {
    set_logger_with_level(logger, LogLevel::Debug);
}

/// Sets the global logger, forwarding records from `min_level` up.
///
/// Only the first call has an effect; later calls are reported on stderr and
/// ignored.
#[cfg_attr(feature = "ffi", uniffi::export)]
pub fn set_logger_with_level(logger: Arc<dyn Logger>, min_level: LogLevel) {
    if HOST_LOGGER
        .set(HostLogger {
            sink: logger,
            min_level,
        })
        .is_err()
    {
        eprintln!("puzzlekit: logger already set");
        return;
    }

    let Some(host) = HOST_LOGGER.get() else {
        return;
    };
    match log::set_logger(host) {
        Ok(()) => log::set_max_level(min_level.as_filter()),
        Err(err) => eprintln!("puzzlekit: failed to set logger: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use log::Log;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(LogLevel, String)>>);

    impl Logger for Recorder {
        fn log(&self, level: LogLevel, message: String) {
            self.0.lock().unwrap().push((level, message));
        }
    }

    fn host(min_level: LogLevel) -> (Arc<Recorder>, HostLogger) {
        let recorder = Arc::new(Recorder::default());
        let host = HostLogger {
            sink: recorder.clone(),
            min_level,
        };
        (recorder, host)
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(LogLevel::from(log::Level::Error), LogLevel::Error);
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Trace);
        assert_eq!(LogLevel::Debug.as_filter(), log::LevelFilter::Debug);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }

    #[test]
    fn test_own_records_pass_from_min_level() {
        let (_, host) = host(LogLevel::Debug);
        assert!(host.accepts(LogLevel::Debug, "puzzlekit_core::coordinator"));
        assert!(host.accepts(LogLevel::Info, "puzzlekit"));
        assert!(!host.accepts(LogLevel::Trace, "puzzlekit_core::session"));

        let (_, quiet) = self::host(LogLevel::Warn);
        assert!(!quiet.accepts(LogLevel::Info, "puzzlekit_core::coordinator"));
        assert!(quiet.accepts(LogLevel::Warn, "puzzlekit_core::storage::local"));
    }

    #[test]
    fn test_dependency_debug_is_dropped() {
        let (_, host) = host(LogLevel::Trace);
        assert!(!host.accepts(LogLevel::Debug, "hyper_util::client"));
        assert!(host.accepts(LogLevel::Info, "reqwest::connect"));
    }

    #[test]
    fn test_records_are_forwarded_with_target() {
        let (recorder, host) = host(LogLevel::Info);

        host.log(
            &log::Record::builder()
                .level(log::Level::Info)
                .target("puzzlekit_core::submission")
                .args(format_args!("guest reward granted"))
                .build(),
        );
        host.log(
            &log::Record::builder()
                .level(log::Level::Debug)
                .target("puzzlekit_core::submission")
                .args(format_args!("incorrect answer"))
                .build(),
        );

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![(
                LogLevel::Info,
                "puzzlekit_core::submission: guest reward granted".to_string()
            )]
        );
    }
}
