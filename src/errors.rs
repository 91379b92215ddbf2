use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Bad reference time stamp: '{0}'")]
    BadStamp(String),

    #[error("Unknown initial task state: {0}")]
    UnknownInitialState(String),

    #[error("Unknown task class: {0}")]
    UnknownClass(String),

    #[error("Duplicate task instance: {0}")]
    DuplicateInstance(String),

    #[error("Illegal message severity: {0}")]
    Severity(String),

    #[error("Malformed task id: {0}")]
    TaskId(String),

    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Status file error: {0}")]
    StatusFile(String),
}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        SchedulerError::StatusFile(err.to_string())
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_stamp_display() {
        let err = SchedulerError::BadStamp("20110101".to_string());
        assert_eq!(err.to_string(), "Bad reference time stamp: '20110101'");
    }

    #[test]
    fn test_unknown_initial_state_display() {
        let err = SchedulerError::UnknownInitialState("sleeping".to_string());
        assert_eq!(err.to_string(), "Unknown initial task state: sleeping");
    }

    #[test]
    fn test_unknown_class_display() {
        let err = SchedulerError::UnknownClass("frobnicator".to_string());
        assert_eq!(err.to_string(), "Unknown task class: frobnicator");
    }

    #[test]
    fn test_duplicate_instance_display() {
        let err = SchedulerError::DuplicateInstance("nzlam%2011010106".to_string());
        assert_eq!(err.to_string(), "Duplicate task instance: nzlam%2011010106");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: SchedulerError = io_err.into();
        match err {
            SchedulerError::StatusFile(msg) => assert!(msg.contains("file missing")),
            other => panic!("Expected StatusFile, got: {:?}", other),
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("not valid json").unwrap_err();
        let err: SchedulerError = json_err.into();
        match err {
            SchedulerError::Config(_) => {}
            other => panic!("Expected Config, got: {:?}", other),
        }
    }
}
