//! Stderr logger for the device.
//!
//! Lines read `[elapsed LEVEL thread] message`. The pipeline workers are
//! named threads (`swingcam-capture`, `swingcam-radar`, `swingcam-replay`,
//! `swingcam-recorder`), so the thread column tells the frame, radar and
//! encoding paths apart. Records from unnamed threads show their module
//! instead. Noisy dependencies can be capped per target prefix.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: LevelFilter,
    /// `(target prefix, cap)` pairs; the longest matching prefix wins.
    pub target_levels: Vec<(String, LevelFilter)>,
}

impl LogConfig {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            // Corner detection is chatty at debug level.
            target_levels: vec![("chess_corners".into(), LevelFilter::Info)],
        }
    }

    /// Effective filter for records from `target`.
    pub fn level_for(&self, target: &str) -> LevelFilter {
        self.target_levels
            .iter()
            .filter(|(prefix, _)| target.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(self.level, |&(_, cap)| cap.min(self.level))
    }

    fn max_level(&self) -> LevelFilter {
        self.level
    }
}

struct DeviceLogger {
    config: LogConfig,
    started: Instant,
}

/// One output line, without the trailing newline.
fn format_line(elapsed_s: f64, level: log::Level, origin: &str, message: &std::fmt::Arguments<'_>) -> String {
    format!("[{elapsed_s:8.3}s {level:>5} {origin}] {message}")
}

/// Current thread name, or the last path segment of `target`.
fn origin<'a>(thread: Option<&'a str>, target: &'a str) -> &'a str {
    match thread {
        Some(name) if name != "main" => name,
        _ => target.rsplit("::").next().unwrap_or(target),
    }
}

impl Log for DeviceLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.config.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            origin(thread.name(), record.target()),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<DeviceLogger> = OnceLock::new();

/// Install the stderr logger. Later calls are no-ops.
pub fn init(config: LogConfig) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let max = config.max_level();
        let logger = LOGGER.get_or_init(|| DeviceLogger {
            config,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(max);
    }
    Ok(())
}

/// [`init`] with the default target caps.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    init(LogConfig::new(level))
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,chess_corners=info"));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_thread_names(true)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .with_thread_names(true)
            .finish()
            .try_init();
    }
}
