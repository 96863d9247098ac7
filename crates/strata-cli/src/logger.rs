//! Stderr logging for the `strata` binary
//!
//! Library crates only talk to the `log` facade. This is the one place a
//! logger gets installed, with the level resolved from `[logging] level`,
//! `STRATA_LOG` or `-v` flags.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let prefix = match record.level() {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        };
        // A closed stderr is not worth failing a command over
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{prefix}] {}: {}",
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger;

/// Install the stderr logger at `level`.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Raise `base` by one level per `-v`.
pub fn verbosity(base: LevelFilter, verbose: u8) -> LevelFilter {
    LevelFilter::iter()
        .skip_while(|level| *level != base)
        .nth(usize::from(verbose))
        .unwrap_or(LevelFilter::Trace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_steps_up() {
        assert_eq!(verbosity(LevelFilter::Warn, 0), LevelFilter::Warn);
        assert_eq!(verbosity(LevelFilter::Warn, 1), LevelFilter::Info);
        assert_eq!(verbosity(LevelFilter::Warn, 2), LevelFilter::Debug);
    }

    #[test]
    fn test_verbosity_saturates_at_trace() {
        assert_eq!(verbosity(LevelFilter::Info, 9), LevelFilter::Trace);
        assert_eq!(verbosity(LevelFilter::Off, 1), LevelFilter::Error);
    }
}
