pub mod config;
pub mod message;
pub mod ref_time;
pub mod requisites;
pub mod task;

pub use config::SuiteConfig;
pub use message::{Severity, TaskMessage};
pub use ref_time::RefTime;
pub use requisites::RequisiteSet;
pub use task::{InitialState, ModeSignal, TaskInstance, TaskState};
