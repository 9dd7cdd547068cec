//! Global logging for `load_sim`, configured from the scenario's `[logging]`.

use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;

use crate::scenario::LoggingConfig;

/// Map a configured level name; anything unknown falls back to INFO.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.to_uppercase().as_str() {
        "OFF" => LevelFilter::Off,
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Install the fern dispatcher: stderr, plus the log file when configured.
pub fn setup_logging(cfg: &LoggingConfig) -> Result<(), fern::InitError> {
    let mut dispatch = Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                msg
            ))
        })
        .level(level_filter(&cfg.level))
        .chain(std::io::stderr());

    if let Some(path) = &cfg.file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(level_filter("debug"), LevelFilter::Debug);
        assert_eq!(level_filter("Warn"), LevelFilter::Warn);
        assert_eq!(level_filter("verbose"), LevelFilter::Info);
    }
}
