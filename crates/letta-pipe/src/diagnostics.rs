use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::errors::ClientError;

#[derive(serde::Serialize)]
struct DiagnosticRecord<'a> {
    timestamp: String,
    #[serde(rename = "type")]
    kind: &'a str,
    content: &'a serde_json::Value,
}

/// Append-only JSONL log of every raw frame, classified event, error, and
/// terminal status of a run.
///
/// The file gets a short header comment block on first use and is only ever
/// appended afterwards. Appends are line-atomic behind a mutex, so
/// concurrent runs may share one log. Failures to write never fail the run;
/// they are reported through the tracing channel instead.
pub struct DiagnosticLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl DiagnosticLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::Config(format!(
                    "failed to create diagnostic log directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let fresh = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                ClientError::Config(format!(
                    "failed to open diagnostic log {}: {e}",
                    path.display()
                ))
            })?;
        if fresh {
            let header = format!(
                "# Letta Response Log\n# Created: {}\n# Format: {{\"timestamp\": \"\", \"type\": \"\", \"content\": \"\"}}\n\n",
                chrono::Utc::now().to_rfc3339()
            );
            file.write_all(header.as_bytes()).map_err(|e| {
                ClientError::Config(format!(
                    "failed to initialize diagnostic log {}: {e}",
                    path.display()
                ))
            })?;
        }
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record. Never fails the caller.
    pub fn record(&self, kind: &str, content: serde_json::Value) {
        let record = DiagnosticRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            kind,
            content: &content,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                warn!(kind, error = %err, "failed to serialize diagnostic record");
                return;
            }
        };
        match self.file.lock() {
            Ok(mut file) => {
                if let Err(err) = writeln!(file, "{line}") {
                    warn!(path = %self.path.display(), error = %err, "failed to append diagnostic record");
                }
            }
            Err(_) => warn!(path = %self.path.display(), "diagnostic log mutex poisoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_written_once_and_records_append() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("responses.jsonl");

        let log = DiagnosticLog::open(&path).expect("open");
        log.record("raw_chunk", serde_json::json!("data: {}"));
        drop(log);

        // Reopening must append, not rewrite.
        let log = DiagnosticLog::open(&path).expect("reopen");
        log.record("done_marker", serde_json::json!("[DONE]"));
        drop(log);

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(
            contents.matches("# Letta Response Log").count(),
            1,
            "header must be written exactly once"
        );

        let records: Vec<serde_json::Value> = contents
            .lines()
            .filter(|line| !line.starts_with('#') && !line.is_empty())
            .map(|line| serde_json::from_str(line).expect("record line parses"))
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("type").and_then(|v| v.as_str()),
            Some("raw_chunk")
        );
        assert!(records[1].get("timestamp").is_some());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/logs/responses.jsonl");
        let log = DiagnosticLog::open(&path).expect("open");
        log.record("error", serde_json::json!({"error": "boom"}));
        assert!(path.exists());
    }
}
