//! Console logger for the stress harness.
//!
//! Prints each record to stderr, coloured by level with ANSI escapes. The
//! level comes from the `LOG` environment variable (`ERROR`, `WARN`, `INFO`,
//! `DEBUG`, `TRACE`, `OFF`; case-insensitive) and defaults to `INFO`.

use std::io::Write;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

struct ConsoleLogger;

/// Installs the console logger. Call once, at the top of `main`.
pub fn init() -> Result<(), SetLoggerError> {
    static LOGGER: ConsoleLogger = ConsoleLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(level_from_env(std::env::var("LOG").ok().as_deref()));
    Ok(())
}

fn level_from_env(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_ascii_uppercase).as_deref() {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        Some("OFF") => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let color = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 34,
            Level::Debug => 32,
            Level::Trace => 90,
        };
        // A failed write to stderr has nowhere better to go.
        let _ = writeln!(
            std::io::stderr().lock(),
            "\u{1B}[{}m[{:>5}] {}\u{1B}[0m",
            color,
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
