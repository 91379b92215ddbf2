//! Per-job status file, written by the job-side messaging command.
//!
//! The file is append-only `KEY=VALUE` text recording the job's lifecycle
//! alongside every message it sent. A vacation message is the one exception
//! to append-only: the job will be restarted, so the entries describing the
//! vacated submission are stripped before the vacation record is appended.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::errors::SchedulerError;
use crate::models::message::Severity;

pub const JOB_PID: &str = "CYLC_JOB_PID";
pub const JOB_INIT_TIME: &str = "CYLC_JOB_INIT_TIME";
pub const JOB_EXIT: &str = "CYLC_JOB_EXIT";
pub const JOB_EXIT_TIME: &str = "CYLC_JOB_EXIT_TIME";
pub const JOB_MESSAGE: &str = "CYLC_MESSAGE";

/// Lines stripped by a vacation rewrite.
const JOB_KEY_PREFIX: &str = "CYLC_JOB_";

pub const ABORT_PREFIX: &str = "Task job script aborted with ";
pub const SIGNAL_PREFIX: &str = "Task job script received signal ";
pub const VACATION_PREFIX: &str = "Task job script vacated by signal ";

const EXIT_SUCCEEDED: &str = "SUCCEEDED";

fn started_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^.+ started for \d{10}$").expect("valid regex"))
}

fn finished_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^.+ finished for \d{10}$").expect("valid regex"))
}

pub struct JobStatusFile {
    path: PathBuf,
}

impl JobStatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one task message, stamped with the current time.
    pub fn record(&self, severity: Severity, message: &str) -> Result<(), SchedulerError> {
        self.record_at(Utc::now(), severity, message)
    }

    /// Record one task message with an explicit event time.
    pub fn record_at(
        &self,
        time: DateTime<Utc>,
        severity: Severity,
        message: &str,
    ) -> Result<(), SchedulerError> {
        let stamp = time.to_rfc3339_opts(SecondsFormat::Secs, true);

        if started_re().is_match(message) {
            self.append(&format!(
                "{}={}\n{}={}\n",
                JOB_PID,
                std::process::id(),
                JOB_INIT_TIME,
                stamp
            ))
        } else if finished_re().is_match(message) {
            self.append(&format!(
                "{}={}\n{}={}\n",
                JOB_EXIT, EXIT_SUCCEEDED, JOB_EXIT_TIME, stamp
            ))
        } else if let Some(reason) = message
            .strip_prefix(SIGNAL_PREFIX)
            .or_else(|| message.strip_prefix(ABORT_PREFIX))
        {
            self.append(&format!(
                "{}={}\n{}={}\n",
                JOB_EXIT, reason, JOB_EXIT_TIME, stamp
            ))
        } else if message.starts_with(VACATION_PREFIX) {
            self.rewrite_for_vacation()?;
            self.append(&message_line(&stamp, severity, message))
        } else {
            self.append(&message_line(&stamp, severity, message))
        }
    }

    fn append(&self, text: &str) -> Result<(), SchedulerError> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Strip the vacated submission's job entries, keeping message history.
    fn rewrite_for_vacation(&self) -> Result<(), SchedulerError> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let kept: String = content
            .lines()
            .filter(|line| !line.starts_with(JOB_KEY_PREFIX))
            .map(|line| format!("{}\n", line))
            .collect();
        std::fs::write(&self.path, kept)?;
        Ok(())
    }
}

fn message_line(stamp: &str, severity: Severity, message: &str) -> String {
    format!("{}={}|{}|{}\n", JOB_MESSAGE, stamp, severity, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn status_file(dir: &tempfile::TempDir) -> JobStatusFile {
        JobStatusFile::new(dir.path().join("job.status"))
    }

    fn event_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2011, 1, 1, 0, 42, 0).unwrap()
    }

    fn read(file: &JobStatusFile) -> String {
        std::fs::read_to_string(file.path()).expect("status file exists")
    }

    #[test]
    fn test_started_message_records_pid_and_init_time() {
        let dir = tempfile::tempdir().unwrap();
        let file = status_file(&dir);
        file.record_at(
            event_time(),
            Severity::Normal,
            "downloader started for 2011010100",
        )
        .unwrap();
        let content = read(&file);
        assert!(content.contains("CYLC_JOB_PID="));
        assert!(content.contains("CYLC_JOB_INIT_TIME=2011-01-01T00:42:00Z"));
    }

    #[test]
    fn test_finished_message_records_successful_exit() {
        let dir = tempfile::tempdir().unwrap();
        let file = status_file(&dir);
        file.record_at(
            event_time(),
            Severity::Normal,
            "downloader finished for 2011010100",
        )
        .unwrap();
        let content = read(&file);
        assert!(content.contains("CYLC_JOB_EXIT=SUCCEEDED"));
        assert!(content.contains("CYLC_JOB_EXIT_TIME=2011-01-01T00:42:00Z"));
    }

    #[test]
    fn test_abort_message_records_reason_as_exit() {
        let dir = tempfile::tempdir().unwrap();
        let file = status_file(&dir);
        file.record_at(
            event_time(),
            Severity::Critical,
            "Task job script aborted with ERR trap",
        )
        .unwrap();
        assert!(read(&file).contains("CYLC_JOB_EXIT=ERR trap"));
    }

    #[test]
    fn test_signal_message_records_signal_as_exit() {
        let dir = tempfile::tempdir().unwrap();
        let file = status_file(&dir);
        file.record_at(
            event_time(),
            Severity::Critical,
            "Task job script received signal 9",
        )
        .unwrap();
        assert!(read(&file).contains("CYLC_JOB_EXIT=9"));
    }

    #[test]
    fn test_plain_message_appends_message_record() {
        let dir = tempfile::tempdir().unwrap();
        let file = status_file(&dir);
        file.record_at(event_time(), Severity::Warning, "disk filling up")
            .unwrap();
        assert_eq!(
            read(&file),
            "CYLC_MESSAGE=2011-01-01T00:42:00Z|WARNING|disk filling up\n"
        );
    }

    #[test]
    fn test_vacation_strips_job_entries_keeps_messages() {
        let dir = tempfile::tempdir().unwrap();
        let file = status_file(&dir);
        file.record_at(
            event_time(),
            Severity::Normal,
            "topnet started for 2011010100",
        )
        .unwrap();
        file.record_at(event_time(), Severity::Normal, "checkpoint written")
            .unwrap();
        file.record_at(
            event_time(),
            Severity::Warning,
            "Task job script vacated by signal 15",
        )
        .unwrap();

        let content = read(&file);
        assert!(!content.contains("CYLC_JOB_PID"));
        assert!(!content.contains("CYLC_JOB_INIT_TIME"));
        assert!(content.contains("CYLC_MESSAGE=2011-01-01T00:42:00Z|NORMAL|checkpoint written"));
        assert!(content
            .contains("CYLC_MESSAGE=2011-01-01T00:42:00Z|WARNING|Task job script vacated by signal 15"));
    }

    #[test]
    fn test_vacation_on_missing_file_just_appends() {
        let dir = tempfile::tempdir().unwrap();
        let file = status_file(&dir);
        file.record_at(
            event_time(),
            Severity::Warning,
            "Task job script vacated by signal 15",
        )
        .unwrap();
        assert!(read(&file).contains("vacated by signal 15"));
    }

    #[test]
    fn test_records_accumulate_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let file = status_file(&dir);
        file.record_at(
            event_time(),
            Severity::Normal,
            "nzlam started for 2011010106",
        )
        .unwrap();
        file.record_at(event_time(), Severity::Normal, "file sls_2011010106.um ready")
            .unwrap();
        file.record_at(
            event_time(),
            Severity::Normal,
            "nzlam finished for 2011010106",
        )
        .unwrap();
        let content = read(&file);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("CYLC_JOB_PID="));
        assert!(lines[2].starts_with("CYLC_MESSAGE="));
        assert!(lines[3].starts_with("CYLC_JOB_EXIT="));
    }
}
