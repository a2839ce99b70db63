#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, WriteLogger};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Log file writer that reopens its file if it disappears underneath it,
/// e.g. when the user clears the data directory while the agent runs.
struct ReopeningLogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ReopeningLogFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn current(&self) -> io::Result<MutexGuard<'_, Option<File>>> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);

        if guard.is_none() || !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            *guard = Some(open_append(&self.path)?);
        }

        Ok(guard)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for ReopeningLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.current()?.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("log file not available")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().map_or(Ok(()), Write::flush)
    }
}

/// Drop the older half of the log once it grows past `max_bytes`, cutting on
/// a line boundary.
fn truncate_oversized_log(log_path: &Path, max_bytes: u64) {
    let Ok(metadata) = std::fs::metadata(log_path) else {
        return;
    };
    if metadata.len() <= max_bytes {
        return;
    }
    let Ok(contents) = std::fs::read(log_path) else {
        return;
    };

    let half = contents.len() / 2;
    let keep_from = contents[half..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(half, |pos| half + pos + 1);
    let _ = std::fs::write(log_path, &contents[keep_from..]);
}

pub fn init_logging(log_path: &Path, debug_enabled: bool, max_log_size: u64) {
    truncate_oversized_log(log_path, max_log_size);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("relaunch")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    #[cfg(debug_assertions)]
    loggers.push(TermLogger::new(
        LevelFilter::Debug,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ));

    match ReopeningLogFile::open(log_path.to_path_buf()) {
        Ok(writer) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, writer)),
        Err(error) => eprintln!("relaunch: cannot open log file {}: {error}", log_path.display()),
    }

    if !loggers.is_empty() {
        let _ = CombinedLogger::init(loggers);
    }

    set_debug_logging(debug_enabled);

    log::info!(
        "relaunch {} logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_path.display()
    );
}

pub fn set_debug_logging(enabled: bool) {
    if enabled {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::{ReopeningLogFile, set_debug_logging, truncate_oversized_log};

    #[test]
    fn writer_recreates_deleted_log_file() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("relaunch.log");
        let mut writer =
            ReopeningLogFile::open(log_path.clone()).expect("writer should open log file");

        writer
            .write_all(b"checking for update\n")
            .expect("initial write should succeed");
        std::fs::remove_file(&log_path).expect("log file should be removable");
        writer
            .write_all(b"update available\n")
            .expect("writer should recreate file after deletion");

        let contents =
            std::fs::read_to_string(&log_path).expect("recreated file should be readable");
        assert_eq!(contents, "update available\n");
    }

    #[test]
    fn oversized_log_keeps_recent_lines() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("relaunch.log");
        let original = "line-1\nline-2\nline-3\nline-4\nline-5\n";
        std::fs::write(&log_path, original).expect("test log file should be written");

        truncate_oversized_log(&log_path, 10);

        let trimmed =
            std::fs::read_to_string(&log_path).expect("trimmed log file should be readable");
        assert!(trimmed.ends_with("line-5\n"));
        assert!(!trimmed.contains("line-1"));
    }

    #[test]
    fn small_log_is_left_alone() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("relaunch.log");
        std::fs::write(&log_path, "short\n").expect("test log file should be written");

        truncate_oversized_log(&log_path, 1024);

        let contents = std::fs::read_to_string(&log_path).expect("log file should be readable");
        assert_eq!(contents, "short\n");
    }

    #[test]
    fn debug_toggle_switches_between_debug_and_info() {
        set_debug_logging(true);
        assert_eq!(log::max_level(), log::LevelFilter::Debug);

        set_debug_logging(false);
        assert_eq!(log::max_level(), log::LevelFilter::Info);
    }
}
