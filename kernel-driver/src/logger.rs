//! `log` records → kernel debugger.

use log::{LevelFilter, Log, Metadata, Record};
use wdk::println;

struct DbgPrintLogger;

impl Log for DbgPrintLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        println!("[{}][{}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: DbgPrintLogger = DbgPrintLogger;

/// Install the logger. A second load of the image finds it already set.
pub fn init() {
    let level = if cfg!(debug_assertions) { LevelFilter::Debug } else { LevelFilter::Info };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
