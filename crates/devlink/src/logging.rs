//! Diagnostics for the `devlink` binary.
//!
//! Command output owns stdout; everything here goes to stderr. The client
//! runs its monitor, keep-alive and event delivery on named threads
//! (`devlink-monitor`, `devlink-keepalive`, `devlink-events-N`), so every
//! line carries the thread name. Module targets are only worth their width
//! when chasing a session problem, so they appear from `debug` up.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Shape of stderr diagnostics.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// One human-readable line per event.
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Most verbose level emitted.
///
/// `warn` (the default) shows rejected commands and lost connections;
/// `info` adds the connect and authenticate milestones; `debug` adds the
/// handshake steps and every unhandled device record; `trace` adds each
/// keep-alive ping.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Whether lines should name the emitting module.
    fn shows_targets(self) -> bool {
        self.as_filter() >= LevelFilter::DEBUG
    }
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(level.shows_targets());

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
