//! Logging setup: env_logger behind the `log` facade, routed through
//! indicatif on a TTY so log lines do not tear the phase progress bars.

use std::io::Write;

use indicatif::MultiProgress;

/// Crates whose records follow the chosen level; dependencies stay at `warn`.
const OWN_CRATES: [&str; 3] = ["songline", "songline_core", "songline_scrape"];

fn label(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

fn ansi(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    }
}

/// Default filter string, e.g. `warn,songline=info,songline_core=info,...`
fn default_filter(level: &str) -> String {
    let mut filter = String::from("warn");
    for name in OWN_CRATES {
        filter.push_str(&format!(",{name}={level}"));
    }
    filter
}

/// Logger that prints above the managed progress bars.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.matches(record) {
            return;
        }
        let level = record.level();
        let line = format!("[{}{}\x1b[0m] {}", ansi(level), label(level), record.args());
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initialize logging once per process.
///
/// `multi` is given only in TTY mode. `RUST_LOG` overrides the default filter.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    let level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let env = env_logger::Env::default().default_filter_or(default_filter(level));

    match multi {
        Some(multi) => {
            let logger = env_logger::Builder::from_env(env).build();
            let max_level = logger.filter();
            if log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone()))).is_ok()
            {
                log::set_max_level(max_level);
            }
        }
        None => {
            // Non-TTY: no colors, one record per line for log aggregation
            let _ = env_logger::Builder::from_env(env)
                .format(|buf, record| writeln!(buf, "[{}] {}", label(record.level()), record.args()))
                .try_init();
        }
    }
}
