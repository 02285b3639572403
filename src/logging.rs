use env_logger::Builder;
use log::{Level, LevelFilter, Record};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

pub fn setup_logging() {
    let colored = atty::is(atty::Stream::Stderr);

    Builder::new()
        .filter_level(LevelFilter::Info) // Set default level
        .parse_env("RUST_LOG") // Allow override through env var
        .format(move |buf, record| {
            let timestamp = humantime::format_rfc3339_millis(SystemTime::now());
            let level = record.level();

            let tag = if colored {
                format!("{}{:>5}\x1B[0m", level_color(level), level)
            } else {
                format!("{:>5}", level)
            };

            // Only include file and line for debug/trace levels
            if level >= Level::Debug {
                writeln!(
                    buf,
                    "{} [{}] {} - {}",
                    tag,
                    timestamp,
                    record.args(),
                    source_location(record)
                )
            } else {
                writeln!(buf, "{} [{}] {}", tag, timestamp, record.args())
            }
        })
        .init();
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1B[31m", // Red
        Level::Warn => "\x1B[33m",  // Yellow
        Level::Info => "\x1B[32m",  // Green
        Level::Debug => "\x1B[36m", // Cyan
        Level::Trace => "\x1B[35m", // Magenta
    }
}

fn source_location(record: &Record) -> String {
    format!(
        "{}:{}",
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0)
    )
}

/// Arrival of a request; the exchange itself is logged by `log_response!`.
#[macro_export]
macro_rules! log_request {
    ($method:expr, $target:expr) => {
        log::debug!("→ {} {}", $method, $target)
    };
}

/// The single line logged for every finished exchange.
#[macro_export]
macro_rules! log_response {
    ($method:expr, $target:expr, $status:expr, $duration:expr, $size:expr, $content_type:expr, $streamed:expr) => {
        log::info!(
            "{} {} ← {} ({} ms) - Size: {} - Type: {} - Transfer: {}",
            $method,
            $target,
            $status,
            $duration.as_millis(),
            $crate::format::format_size($size),
            $content_type,
            if $streamed { "streamed" } else { "buffered" }
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        log::error!("❌ {} - {}", $context, $error)
    };
}

// Trait for types that can be logged
pub trait Loggable {
    fn log_description(&self) -> String;
}

impl Loggable for str {
    fn log_description(&self) -> String {
        self.to_string()
    }
}

impl Loggable for Path {
    fn log_description(&self) -> String {
        self.display().to_string()
    }
}

pub trait LoggingExt: Loggable {
    fn log_operation<F, T, E>(&self, operation: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display;
}

impl<S: ?Sized + Loggable> LoggingExt for S {
    fn log_operation<F, T, E>(&self, operation: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display,
    {
        log::trace!("Starting {} on {}", operation, self.log_description());
        match f() {
            Ok(result) => {
                log::trace!("Completed {} on {}", operation, self.log_description());
                Ok(result)
            }
            Err(e) => {
                // Expected for missing candidates, so keep it below warn
                log::debug!("Failed {} on {}: {}", operation, self.log_description(), e);
                Err(e)
            }
        }
    }
}
