// Daemon assembly: the scheduler loop and its collaborators.

pub mod launcher;
pub mod scheduler;
pub mod status_file;

pub use launcher::{JobLauncher, ShellLauncher};
pub use scheduler::{Scheduler, TaskPool};
pub use status_file::JobStatusFile;
