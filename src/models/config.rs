use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::SchedulerError;
use crate::models::ref_time::RefTime;

/// One seeded task: a class name and the state to start it in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub class: String,
    #[serde(default = "default_state")]
    pub state: String,
}

fn default_state() -> String {
    "waiting".to_string()
}

/// Suite configuration, loaded from a JSON file. Every field has a default
/// so a missing or partial file still yields a runnable suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Cycle the suite starts at, as a `YYYYMMDDHH` stamp.
    #[serde(default = "default_start_time")]
    pub start_time: String,
    /// Task classes to seed into the pool at the start cycle.
    #[serde(default = "default_tasks")]
    pub tasks: Vec<TaskEntry>,
    /// When set, external jobs are replaced by the dummy driver running at
    /// this clock-rate multiple of real time.
    #[serde(default)]
    pub dummy_clock_rate: Option<f64>,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_start_time() -> String {
    "2011010100".to_string()
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_tasks() -> Vec<TaskEntry> {
    [
        "downloader",
        "nzlam",
        "nzlam_post",
        "globalprep",
        "globalwave",
        "nzwave",
        "ricom",
        "mos",
        "nztide",
        "topnet",
        "nwpglobal",
    ]
    .iter()
    .map(|class| TaskEntry {
        class: class.to_string(),
        state: default_state(),
    })
    .collect()
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            start_time: default_start_time(),
            tasks: default_tasks(),
            dummy_clock_rate: None,
            tick_interval_ms: default_tick_interval_ms(),
            data_dir: None,
        }
    }
}

impl SuiteConfig {
    /// Load configuration. An explicit path must exist and parse; with no
    /// path, the platform config file is used when present, defaults
    /// otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, SchedulerError> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let fallback = dirs::config_dir()
                    .map(|d| d.join("forecast-cycle-scheduler").join("config.json"));
                fallback.filter(|p| p.exists())
            }
        };

        match resolved {
            Some(p) => {
                let content = std::fs::read_to_string(&p).map_err(|e| {
                    SchedulerError::Config(format!("cannot read {}: {}", p.display(), e))
                })?;
                Ok(serde_json::from_str(&content)?)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn start(&self) -> Result<RefTime, SchedulerError> {
        self.start_time.parse()
    }

    /// Directory for job status files and other run artifacts.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("forecast-cycle-scheduler")
        })
    }
}
