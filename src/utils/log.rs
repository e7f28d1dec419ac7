//! Leveled stderr logging for block processing.
//!
//! Each line is coloured by level and may carry an epoch timestamp and the
//! level tag. Lines below [`set_level`] are dropped. The macros compile to
//! nothing observable under `cfg(test)`.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    fn from_u8(value: u8) -> Level {
        match value {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            _ => Level::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    fn color(&self) -> ColorSpec {
        let mut color = ColorSpec::new();
        match self {
            Level::Debug => {
                color.set_fg(Some(Color::Cyan)).set_dimmed(true);
            }
            Level::Info => {}
            Level::Warn => {
                color.set_fg(Some(Color::Yellow)).set_bold(true);
            }
            Level::Error => {
                color.set_fg(Some(Color::Red)).set_bold(true);
            }
        }
        color
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

static SHOW_TIMESTAMP: AtomicBool = AtomicBool::new(true);
static SHOW_LEVEL: AtomicBool = AtomicBool::new(true);
static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Sets the lowest level that gets printed. Defaults to [`Level::Info`].
pub fn set_level(level: Level) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn level() -> Level {
    Level::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: Level) -> bool {
    level >= self::level()
}

pub fn show_timestamp(show: bool) {
    SHOW_TIMESTAMP.store(show, Ordering::Relaxed);
}

pub fn show_level(show: bool) {
    SHOW_LEVEL.store(show, Ordering::Relaxed);
}

/// Line prefix for `level` at `since_epoch`, honouring the display toggles.
fn prefix(level: Level, since_epoch: Duration) -> String {
    let mut out = String::new();
    if SHOW_TIMESTAMP.load(Ordering::Relaxed) {
        out.push_str(&format!(
            "{}.{:03} ",
            since_epoch.as_secs(),
            since_epoch.subsec_millis()
        ));
    }
    if SHOW_LEVEL.load(Ordering::Relaxed) {
        out.push_str(&format!("[{level:5}] "));
    }
    out
}

/// Backend of the logging macros.
#[doc(hidden)]
pub fn log(level: Level, message: &str) {
    if !enabled(level) {
        return;
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(&level.color());
    let _ = writeln!(stderr, "{}{message}", prefix(level, now));
    let _ = stderr.reset();
}

/// Logs a debug-level message.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{
        if cfg!(not(test)) && $crate::utils::log::enabled($crate::utils::log::Level::Debug) {
            $crate::utils::log::log($crate::utils::log::Level::Debug, &format!($($arg)*))
        }
    }};
}

/// Logs an info-level message.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        if cfg!(not(test)) {
            $crate::utils::log::log($crate::utils::log::Level::Info, &format!($($arg)*))
        }
    }};
}

/// Logs a warning-level message.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        if cfg!(not(test)) {
            $crate::utils::log::log($crate::utils::log::Level::Warn, &format!($($arg)*))
        }
    }};
}

/// Logs an error-level message.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        if cfg!(not(test)) {
            $crate::utils::log::log($crate::utils::log::Level::Error, &format!($($arg)*))
        }
    }};
}
