use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SchedulerError;

/// Severity of an incoming task message, as reported by the external job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
    Custom,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "NORMAL",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(Severity::Normal),
            "WARNING" => Ok(Severity::Warning),
            "CRITICAL" => Ok(Severity::Critical),
            "CUSTOM" => Ok(Severity::Custom),
            other => Err(SchedulerError::Severity(other.to_string())),
        }
    }
}

/// A message from an external job addressed to one task instance.
///
/// `task_id` is the instance identity `<class>%<ref_time>`; the text is
/// opaque to the transport and interpreted by the instance itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: String,
    pub severity: Severity,
    pub text: String,
}

impl TaskMessage {
    pub fn new(task_id: &str, severity: Severity, text: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            severity,
            text: text.to_string(),
        }
    }

    /// Split the task id into its class and reference-time parts.
    pub fn split_id(&self) -> Result<(&str, &str), SchedulerError> {
        split_task_id(&self.task_id)
    }
}

/// Split `<class>%<ref_time>` into its two parts.
pub fn split_task_id(id: &str) -> Result<(&str, &str), SchedulerError> {
    match id.split_once('%') {
        Some((class, ref_time)) if !class.is_empty() && !ref_time.is_empty() => {
            Ok((class, ref_time))
        }
        _ => Err(SchedulerError::TaskId(id.to_string())),
    }
}
