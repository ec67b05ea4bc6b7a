//! Timestamped dual-sink logger.
//!
//! Every line goes to standard output and is appended to the log file in
//! the form `<YYYY-MM-DD HH:MM:SS> : <message>`. There is no buffering, no
//! level filtering and no rotation; the file grows without bound.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;

use crate::error::BerthResult;

pub struct Logger {
    file: Mutex<File>,
    echo: bool,
}

impl Logger {
    /// Open the log file for appending, creating its parent directory if
    /// missing. With `echo` disabled, lines go to the file only (used by
    /// the --json CLI mode to keep stdout machine-readable).
    pub fn open(path: &Path, echo: bool) -> BerthResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            echo,
        })
    }

    /// Append one timestamped line to stdout and the log file.
    ///
    /// Failures writing the file sink are ignored; a lost log line never
    /// fails a deployment.
    pub fn log(&self, message: &str) {
        let line = format!("{} : {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message);

        if self.echo {
            println!("{line}");
        }

        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
        }
    }

    pub fn warn(&self, message: &str) {
        self.log(&format!("WARNING: {message}"));
    }

    pub fn error(&self, message: &str) {
        self.log(&format!("ERROR: {message}"));
    }
}
