//! Logger setup for the service binaries.
//!
//! Operational diagnostics go to the system log by default. `env_logger` on
//! stderr is the alternative for development or when run under a
//! supervisor that captures stderr.
//!
//! | `log` level     | syslog priority |
//! |-----------------|-----------------|
//! | error           | `LOG_ERR`       |
//! | warn            | `LOG_WARNING`   |
//! | info            | `LOG_NOTICE`    |
//! | debug, trace    | `LOG_DEBUG`     |

use std::ffi::CString;

use anyhow::{Context, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::config::{LogConfig, LogTarget};

/// Format string handed to `syslog(3)`; the message is always an argument.
const SYSLOG_FORMAT: &[u8] = b"%s\0";

/// `log::Log` implementation writing to the system log.
#[derive(Debug)]
pub struct SyslogLogger {
    /// `openlog` keeps the pointer, so the ident must outlive the logger.
    ident: CString,
    level: LevelFilter,
}

impl SyslogLogger {
    /// Logger tagging its lines with `ident`.
    pub fn new(ident: &str, level: LevelFilter) -> Result<Self> {
        let ident = CString::new(ident).context("syslog ident contains a NUL byte")?;
        Ok(Self { ident, level })
    }

    /// Open the system log and install this logger globally.
    pub fn install(self) -> Result<()> {
        let level = self.level;
        let logger: &'static Self = Box::leak(Box::new(self));
        // SAFETY: the ident is a valid NUL-terminated string owned by a
        // leaked logger, so it stays valid for the rest of the process.
        unsafe {
            libc::openlog(
                logger.ident.as_ptr(),
                libc::LOG_PID | libc::LOG_CONS | libc::LOG_NDELAY,
                libc::LOG_USER,
            );
        }
        log::set_logger(logger).context("logger already installed")?;
        log::set_max_level(level);
        Ok(())
    }

    /// syslog priority for a `log` level.
    pub fn priority(level: Level) -> libc::c_int {
        match level {
            Level::Error => libc::LOG_ERR,
            Level::Warn => libc::LOG_WARNING,
            Level::Info => libc::LOG_NOTICE,
            Level::Debug | Level::Trace => libc::LOG_DEBUG,
        }
    }
}

impl Log for SyslogLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Interior NULs would truncate the line; replace them.
        let text = record.args().to_string().replace('\0', "\\0");
        let Ok(line) = CString::new(text) else {
            return;
        };
        // SAFETY: both pointers are valid NUL-terminated strings for the
        // duration of the call, and the format consumes exactly one `%s`.
        unsafe {
            libc::syslog(
                Self::priority(record.level()),
                SYSLOG_FORMAT.as_ptr().cast(),
                line.as_ptr(),
            );
        }
    }

    fn flush(&self) {}
}

/// Install the global logger described by `config`.
///
/// `ident` tags syslog lines (usually the binary name).
pub fn init(config: &LogConfig, ident: &str) -> Result<()> {
    let level = config.level_filter();
    match config.target {
        LogTarget::Syslog => {
            SyslogLogger::new(ident, level)?.install()?;
        }
        LogTarget::Stderr => {
            env_logger::Builder::new()
                .filter_level(level)
                .format_timestamp_secs()
                .target(env_logger::Target::Stderr)
                .try_init()
                .context("logger already installed")?;
        }
    }
    Ok(())
}
