use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use crate::daemon::{JobStatusFile, Scheduler, ShellLauncher, TaskPool};
use crate::models::{Severity, SuiteConfig};

#[derive(Parser)]
#[command(
    name = "fcs",
    version,
    about = "Forecast Cycle Scheduler - dependency-driven cycling suite scheduler"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the scheduler in the foreground
    Run {
        /// Path to the suite configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured start cycle (YYYYMMDDHH)
        #[arg(long)]
        start_time: Option<String>,
        /// Replace external jobs with the dummy driver at this clock-rate
        /// multiple of real time
        #[arg(long)]
        dummy_rate: Option<f64>,
    },
    /// Report a task message from a running job: echo it and update the
    /// job status file
    Message {
        /// Task the message is from, as <class>%<ref_time>
        #[arg(long)]
        task_id: String,
        /// NORMAL, WARNING, CRITICAL or CUSTOM
        #[arg(long, default_value = "NORMAL")]
        severity: String,
        /// Job status file to update (default: $FCS_STATUS_FILE, skipped
        /// when unset)
        #[arg(long)]
        status_file: Option<PathBuf>,
        /// Message text
        #[arg(required = true)]
        text: Vec<String>,
    },
}

pub async fn dispatch(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Run {
            config,
            start_time,
            dummy_rate,
        } => run(config.as_deref(), start_time.as_deref(), *dummy_rate).await,
        Command::Message {
            task_id,
            severity,
            status_file,
            text,
        } => message(task_id, severity, status_file.as_deref(), text),
    }
}

async fn run(
    config_path: Option<&Path>,
    start_time: Option<&str>,
    dummy_rate: Option<f64>,
) -> Result<()> {
    let mut config = SuiteConfig::load(config_path)?;
    if let Some(start) = start_time {
        config.start_time = start.to_string();
    }
    if let Some(rate) = dummy_rate {
        config.dummy_clock_rate = Some(rate);
    }

    let pool = TaskPool::seed(&config).context("seeding the task pool")?;
    let launcher = Arc::new(ShellLauncher::new(config.dummy_clock_rate));
    let (tx, rx) = mpsc::channel(64);
    // the sender is the seam the message transport clones; dropping the last
    // clone stops the scheduler
    let _mailbox = tx;

    let scheduler = Scheduler::new(
        pool,
        rx,
        launcher,
        Duration::from_millis(config.tick_interval_ms),
    );
    tokio::select! {
        result = scheduler.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            Ok(())
        }
    }
}

fn message(
    task_id: &str,
    severity: &str,
    status_file: Option<&Path>,
    text: &[String],
) -> Result<()> {
    let severity: Severity = severity.parse()?;
    let text = text.join(" ");
    let now = Utc::now();
    let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    let line = format!("{} {} - [{}] {}", stamp, severity, task_id, text);
    match severity {
        Severity::Normal | Severity::Custom => println!("{}", line),
        Severity::Warning | Severity::Critical => eprintln!("{}", line),
    }

    let path = status_file
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("FCS_STATUS_FILE").map(PathBuf::from));
    if let Some(path) = path {
        JobStatusFile::new(path)
            .record_at(now, severity, &text)
            .context("updating job status file")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_subcommand_flags() {
        let cli = Cli::parse_from([
            "fcs",
            "run",
            "--start-time",
            "2011010100",
            "--dummy-rate",
            "60",
        ]);
        match cli.command {
            Command::Run {
                start_time,
                dummy_rate,
                config,
            } => {
                assert_eq!(start_time.as_deref(), Some("2011010100"));
                assert_eq!(dummy_rate, Some(60.0));
                assert!(config.is_none());
            }
            _ => panic!("Expected Run"),
        }
    }

    #[test]
    fn test_message_subcommand_collects_text() {
        let cli = Cli::parse_from([
            "fcs",
            "message",
            "--task-id",
            "downloader%2011010100",
            "downloader",
            "started",
            "for",
            "2011010100",
        ]);
        match cli.command {
            Command::Message {
                task_id,
                severity,
                text,
                ..
            } => {
                assert_eq!(task_id, "downloader%2011010100");
                assert_eq!(severity, "NORMAL");
                assert_eq!(text.join(" "), "downloader started for 2011010100");
            }
            _ => panic!("Expected Message"),
        }
    }
}
