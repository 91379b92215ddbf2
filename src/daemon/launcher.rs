use async_trait::async_trait;

use crate::errors::SchedulerError;
use crate::models::ref_time::RefTime;
use crate::registry::TaskClass;

/// Collaborator that starts external jobs. Launches are fire-and-forget:
/// the scheduler never awaits completion, it hears back through task
/// messages.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(
        &self,
        class: &'static TaskClass,
        ref_time: RefTime,
    ) -> Result<(), SchedulerError>;
}

/// Dummy-mode command; stands in for every class when a clock rate is set.
const DUMMY_COMMAND: &str = "bin/task-dummy {class} {ref_time} {rate}";

/// Launches jobs as detached shell commands built from the class command
/// template (or the dummy driver when a clock rate is configured).
pub struct ShellLauncher {
    dummy_clock_rate: Option<f64>,
}

impl ShellLauncher {
    pub fn new(dummy_clock_rate: Option<f64>) -> Self {
        Self { dummy_clock_rate }
    }

    fn command_for(&self, class: &TaskClass, ref_time: RefTime) -> String {
        match self.dummy_clock_rate {
            Some(rate) => DUMMY_COMMAND
                .replace("{class}", class.name)
                .replace("{ref_time}", &ref_time.to_string())
                .replace("{rate}", &rate.to_string()),
            None => class.command.replace("{ref_time}", &ref_time.to_string()),
        }
    }
}

#[async_trait]
impl JobLauncher for ShellLauncher {
    async fn launch(
        &self,
        class: &'static TaskClass,
        ref_time: RefTime,
    ) -> Result<(), SchedulerError> {
        let command = self.command_for(class, ref_time);
        tracing::info!("launching external job for {}: {}", ref_time, command);

        let mut child = tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(&command)
            .spawn()
            .map_err(|e| SchedulerError::Launch(format!("'{}': {}", command, e)))?;

        // reap in the background so the child never becomes a zombie; the
        // scheduler itself does not wait
        let label = format!("{}%{}", class.name, ref_time);
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::warn!("external job for {} exited with {}", label, status);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("could not reap external job for {}: {}", label, e),
            }
        });

        Ok(())
    }
}
