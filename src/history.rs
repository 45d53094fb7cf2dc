//! Persistent command history
//!
//! One entry per line: `<unix_seconds>|<status>|<command>`. The command is
//! the final field and may itself contain `|`. The file is owner-only;
//! loose permissions found on open are tightened. Appends take an
//! in-process mutex so the invariants survive future concurrent callers.

use std::fs::{File, OpenOptions, Permissions};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history file {0}: {1}")]
    Io(String, #[source] io::Error),
}

/// One persisted command.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: i64,
    pub exit_code: i32,
    pub command: String,
}

impl HistoryEntry {
    /// Parse one stored line; `None` for malformed lines, which readers
    /// skip rather than fail on.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.splitn(3, '|');
        let timestamp = fields.next()?.parse().ok()?;
        let exit_code = fields.next()?.parse().ok()?;
        let command = fields.next()?.to_string();
        Some(HistoryEntry {
            timestamp,
            exit_code,
            command,
        })
    }

    fn to_line(&self) -> String {
        format!("{}|{}|{}\n", self.timestamp, self.exit_code, self.command)
    }
}

/// Append-only store over the flatfile. The open handle is exclusively
/// owned here; `recent` re-reads the file instead of trusting any cache.
pub struct HistoryStore {
    path: PathBuf,
    file: Mutex<File>,
    last_command: Mutex<Option<String>>,
}

impl HistoryStore {
    /// Open (creating if needed, mode 0600) and fix loose permissions.
    /// When `warn_loose_perms` is set the fix is reported on stderr.
    pub fn open(path: &Path, warn_loose_perms: bool) -> Result<Self, HistoryError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| HistoryError::Io(path.display().to_string(), e))?;

        let metadata = file
            .metadata()
            .map_err(|e| HistoryError::Io(path.display().to_string(), e))?;
        if metadata.permissions().mode() & 0o077 != 0 {
            if warn_loose_perms {
                eprintln!(
                    "gshell: history file {} was group/world accessible; fixing to 0600",
                    path.display()
                );
            }
            let _ = file.set_permissions(Permissions::from_mode(0o600));
        }

        Ok(HistoryStore {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            last_command: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. A command equal to the most recently appended one
    /// is suppressed; duplicates separated by other commands are kept.
    pub fn append(&self, command: &str, status: i32) -> Result<(), HistoryError> {
        {
            let mut last = self.last_command.lock().unwrap_or_else(|e| e.into_inner());
            if last.as_deref() == Some(command) {
                return Ok(());
            }
            *last = Some(command.to_string());
        }

        let entry = HistoryEntry {
            timestamp: chrono::Utc::now().timestamp(),
            exit_code: status,
            command: command.to_string(),
        };
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(entry.to_line().as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| HistoryError::Io(self.path.display().to_string(), e))
    }

    /// Re-read the file and return the last `limit` entries in file order.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        read_recent(&self.path, limit)
    }

    /// Sync the handle to disk.
    pub fn flush(&self) -> Result<(), HistoryError> {
        let file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.sync_all()
            .map_err(|e| HistoryError::Io(self.path.display().to_string(), e))
    }
}

/// Last `limit` well-formed entries of a history file, oldest first.
pub fn read_recent(path: &Path, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(HistoryError::Io(path.display().to_string(), e)),
    };
    let mut entries: Vec<HistoryEntry> = BufReader::new(file)
        .lines()
        .filter_map(|line| line.ok())
        .filter_map(|line| HistoryEntry::parse(&line))
        .collect();
    if entries.len() > limit {
        entries.drain(..entries.len() - limit);
    }
    Ok(entries)
}
