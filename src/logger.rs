use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;

static LOG_STORE: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(vec![]));

static LOGGER: Logger = Logger;

fn add_to_log_store(message: String) {
    if let Ok(mut store) = LOG_STORE.lock() {
        store.push(message);
    }
}

/// Prints log lines to stderr and keeps every line for later inspection.
#[derive(Debug)]
pub struct Logger;

impl Logger {
    /// Install the logger. Only the first call installs it, later calls only
    /// change the level.
    pub fn init(level: LevelFilter) {
        if log::set_logger(&LOGGER).is_err() {
            log::debug!("Logger already installed");
        }
        log::set_max_level(level);
    }

    /// Level for the usual `--verbose`/`--quiet` switches. Quiet wins.
    pub fn level_for(verbose: bool, quiet: bool) -> LevelFilter {
        if quiet {
            LevelFilter::Off
        } else if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    /// Every line logged so far.
    pub fn history() -> Vec<String> {
        LOG_STORE
            .lock()
            .map(|store| store.clone())
            .unwrap_or_default()
    }

    fn format(record: &Record) -> String {
        format!(
            "[{} {} {}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = Self::format(record);

        eprintln!("{message}");
        add_to_log_store(message);
    }

    fn flush(&self) {}
}
