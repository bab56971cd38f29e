use alloc::string::String;
use core::{fmt::Write as _, mem::take};

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use vexide::core::sync::Mutex;

static CONSOLE_BUFFER: Mutex<String> = Mutex::new(String::new());

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // The executor is single threaded, so the lock is only held while a
        // drain is in progress; a line logged then is dropped.
        if let Some(mut buffer) = CONSOLE_BUFFER.try_lock() {
            _ = writeln!(buffer, "{} - {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Installs the `log` backend. Lines are held until [`drain_console`].
pub fn init_logger() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(LevelFilter::Debug);
    Ok(())
}

/// Takes every console line logged since the last drain.
pub fn drain_console() -> Option<String> {
    let mut buffer = CONSOLE_BUFFER.try_lock()?;
    if buffer.is_empty() {
        return None;
    }
    Some(take(&mut *buffer))
}
