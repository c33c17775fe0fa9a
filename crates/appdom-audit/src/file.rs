//! File-based audit handler.
//!
//! Records append to `<domain-dir>/data/audit-log.log` (and per-server
//! equivalents) as newline-delimited JSON blocks, each prefixed with a
//! `YYYY-MM-DD HH:MM:SS - ` timestamp. [`RECORD_PREFIX`] recognizes record
//! starts when scanning a log back in.

use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::logger::{AuditError, AuditHandler};
use crate::record::AuditRecord;

/// Regex matching the timestamp prefix of one record line.
pub const RECORD_PREFIX: &str = r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} - ";

fn prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(RECORD_PREFIX).expect("valid prefix regex"))
}

/// Appends audit records to one log file.
pub struct FileHandler {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHandler {
    /// Creates a handler appending to `path`. Parent directories are
    /// created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses every record block out of a log file.
    pub fn scan(path: &Path) -> Result<Vec<AuditRecord>, AuditError> {
        let content = fs::read_to_string(path)?;
        let re = prefix_regex();
        let mut records = Vec::new();
        for line in content.lines() {
            let Some(matched) = re.find(line) else {
                continue;
            };
            let json: serde_json::Value = serde_json::from_str(&line[matched.end()..])
                .map_err(|e| AuditError::Serialize(e.to_string()))?;
            if let Some(record) = AuditRecord::from_json(&json) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

impl AuditHandler for FileHandler {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let _guard = self.write_lock.lock().unwrap();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = format!(
            "{} - {}\n",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.to_json()
        );
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AccessMechanism;
    use appdom_exec::Operation;
    use appdom_model::PathAddress;

    fn record(uuid: &str) -> AuditRecord {
        let op = Operation::new("add", PathAddress::parse("/system-property=x").unwrap());
        AuditRecord::new(AccessMechanism::Native, true, &[op]).with_domain_uuid(uuid)
    }

    #[test]
    fn append_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("audit-log.log");
        let handler = FileHandler::new(&path);
        handler.append(&record("u-1")).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn lines_match_prefix_regex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit-log.log");
        let handler = FileHandler::new(&path);
        handler.append(&record("u-1")).unwrap();
        handler.append(&record("u-2")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let re = Regex::new(RECORD_PREFIX).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert!(re.is_match(line), "line did not match prefix: {line}");
        }
    }

    #[test]
    fn scan_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit-log.log");
        let handler = FileHandler::new(&path);
        handler.append(&record("u-1")).unwrap();
        handler.append(&record("u-2")).unwrap();

        let records = FileHandler::scan(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].domain_uuid.as_deref(), Some("u-1"));
        assert_eq!(records[1].domain_uuid.as_deref(), Some("u-2"));
        assert_eq!(records[0].operations.len(), 1);
    }

    #[test]
    fn scan_skips_unrecognized_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit-log.log");
        fs::write(&path, "not an audit line\n").unwrap();

        let handler = FileHandler::new(&path);
        handler.append(&record("u-1")).unwrap();

        let records = FileHandler::scan(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn appends_are_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit-log.log");
        let handler = FileHandler::new(&path);
        for i in 0..10 {
            handler.append(&record(&format!("u-{i}"))).unwrap();
        }
        let records = FileHandler::scan(&path).unwrap();
        let uuids: Vec<String> = records.into_iter().filter_map(|r| r.domain_uuid).collect();
        assert_eq!(uuids, (0..10).map(|i| format!("u-{i}")).collect::<Vec<_>>());
    }
}
