//! Logger module
//!
//! Provides logging utilities for the HTTP server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Level-gated error, warning, info and debug logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Settings;
use crate::scope::StartupConfig;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Error log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    /// Parse a level keyword; syslog-style names fold onto the nearest level
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "emerg" | "alert" | "crit" | "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "notice" | "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Error,
            1 => Self::Warn,
            2 => Self::Info,
            _ => Self::Debug,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

pub fn set_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

fn enabled(level: LogLevel) -> bool {
    level <= self::level()
}

/// Initialize the logger with settings
///
/// Should be called once at application startup.
pub fn init(settings: &Settings) -> std::io::Result<()> {
    if let Some(level) = LogLevel::from_keyword(&settings.logging.level) {
        set_level(level);
    }
    writer::init(
        settings.logging.access_log_file.as_deref(),
        settings.logging.error_log_file.as_deref(),
    )
}

/// Write to info/access log
fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, settings: &Settings, startup: &StartupConfig) {
    write_info("======================================");
    write_info("scopehttpd started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Log level: {}", level().as_str()));
    write_info(&format!(
        "Directive file: {}",
        settings.directive_file().display()
    ));
    write_info(&format!(
        "Document root: {}",
        startup.main.document_root.display()
    ));
    write_info(&format!(
        "Sections: {} directory, {} location",
        startup.main.directories.len(),
        startup.main.locations.len()
    ));
    if !startup.virtual_hosts.is_empty() {
        write_info(&format!("Virtual hosts: {}", startup.virtual_hosts.len()));
    }
    if let Some(workers) = settings.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = settings.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = settings.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    log_debug(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    log_error(&format!("Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    if enabled(LogLevel::Warn) {
        write_error(&format!("[WARN] {message}"));
    }
}

pub fn log_info(message: &str) {
    if enabled(LogLevel::Info) {
        write_error(&format!("[INFO] {message}"));
    }
}

pub fn log_debug(message: &str) {
    if enabled(LogLevel::Debug) {
        write_error(&format!("[DEBUG] {message}"));
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    let line = entry.format(format);
    match writer::get() {
        Some(w) => w.write_access(&line),
        None => println!("{line}"),
    }
}

pub fn log_shutdown(active: usize) {
    write_info(&format!(
        "[Shutdown] Listener closed, {active} connection(s) still finishing"
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_keywords() {
        assert_eq!(LogLevel::from_keyword("crit"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_keyword("Notice"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_keyword("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_keyword("loud"), None);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert_eq!(LogLevel::from_u8(LogLevel::Warn as u8), LogLevel::Warn);
    }
}
