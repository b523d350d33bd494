//! Session logger: the `log` backend for the binary.
//!
//! Every record goes to one file in the OS data directory, which is
//! **truncated at each launch** so it only holds the latest session, and is
//! mirrored to stderr. A panic hook copies the panic message into the file.
//!
//! Log location:
//!   Windows:  `%APPDATA%\trimap-editor\session.log`
//!   Linux:    `~/.local/share/trimap-editor/session.log`
//!   macOS:    `~/Library/Application Support/trimap-editor/session.log`
//!
//! The level defaults to `info` and can be changed with `TRIMAP_LOG`
//! (`error`, `warn`, `info`, `debug`, `trace`).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};

static LOGGER: SessionLogger = SessionLogger;
static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

struct SessionLogger;

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{}] [{}] {}",
            timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        eprintln!("{line}");
        write_line(&line);
    }

    fn flush(&self) {
        if let Some(mutex) = LOG_FILE.get()
            && let Ok(mut file) = mutex.lock()
        {
            let _ = file.flush();
        }
    }
}

/// Path of the current session log, once [`init`] has opened it.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Append a raw line to the session file. I/O errors are ignored.
fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Install the logger. Call once, first thing in `main`.
///
/// A log file that cannot be opened is not fatal: records still reach
/// stderr.
pub fn init() {
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            let _ = LOG_FILE.set(Mutex::new(f));
            write_line(&format!(
                "=== trimap-editor {} session started (unix {}) ===",
                env!("CARGO_PKG_VERSION"),
                unix_seconds()
            ));
        }
        Err(e) => eprintln!("[logger] failed to open log file {:?}: {}", path, e),
    }

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_from_env());
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
}

fn level_from_env() -> LevelFilter {
    std::env::var("TRIMAP_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

fn log_file_path() -> PathBuf {
    data_dir().join("trimap-editor").join("session.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    let secs = unix_seconds();
    format!(
        "{:02}:{:02}:{:02}",
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_sits_in_app_folder() {
        assert!(log_file_path().ends_with("trimap-editor/session.log"));
        // Nothing in the test binary installs the logger.
        assert_eq!(log_path(), None);
    }

    #[test]
    fn timestamp_is_clock_time() {
        let t = timestamp();
        assert_eq!(t.len(), 8);
        assert_eq!(t.matches(':').count(), 2);
    }
}
