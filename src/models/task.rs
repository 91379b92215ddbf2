use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::SchedulerError;
use crate::models::message::Severity;
use crate::models::ref_time::RefTime;
use crate::models::requisites::RequisiteSet;
use crate::registry::{TaskClass, TemplateContext, Variant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Waiting,
    Running,
    Finished,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Finished => "finished",
        })
    }
}

/// State an instance may be seeded in. `Ready` is waiting with all
/// prerequisites pre-satisfied; `Finished` additionally pre-satisfies the
/// postrequisites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialState {
    #[default]
    Waiting,
    Ready,
    Finished,
}

impl FromStr for InitialState {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(InitialState::Waiting),
            "ready" => Ok(InitialState::Ready),
            "finished" => Ok(InitialState::Finished),
            other => Err(SchedulerError::UnknownInitialState(other.to_string())),
        }
    }
}

/// Suite-wide operating-mode signal extracted from a fuzzy-consumer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSignal {
    Catchup,
    Uptodate,
}

fn mode_signal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(CATCHUP|UPTODATE):.*for (\d{10})$").expect("valid regex"))
}

/// One task instance: a particular class at a particular cycle, tracking
/// the prerequisites it is waiting on and the postrequisites its external
/// job will produce. All state changes arrive through the scheduler thread:
/// matching passes, dispatch decisions, and incoming job messages.
#[derive(Debug)]
pub struct TaskInstance {
    class: &'static TaskClass,
    ref_time: RefTime,
    state: TaskState,
    prerequisites: RequisiteSet,
    postrequisites: RequisiteSet,
    latest_message: String,
    abdicated: bool,
}

impl TaskInstance {
    /// Stamp an instance out of its class template. The requested cycle is
    /// adjusted to the class's nearest valid hour before the templates are
    /// evaluated.
    pub fn spawn(
        class: &'static TaskClass,
        requested: RefTime,
        initial: InitialState,
        ctx: &TemplateContext,
    ) -> Self {
        let ref_time = requested.nearest(class.valid_hours);
        let prerequisites = (class.prerequisites)(ref_time, ctx);
        let postrequisites = (class.postrequisites)(ref_time);

        let mut instance = Self {
            class,
            ref_time,
            state: TaskState::Waiting,
            prerequisites,
            postrequisites,
            latest_message: String::new(),
            abdicated: false,
        };

        match initial {
            InitialState::Waiting => {}
            InitialState::Ready => {
                tracing::warn!("{} starting in READY state", instance.identity());
                instance.prerequisites.set_all_satisfied();
            }
            InitialState::Finished => {
                tracing::warn!("{} starting in FINISHED state", instance.identity());
                instance.postrequisites.set_all_satisfied();
                instance.state = TaskState::Finished;
            }
        }

        if let Variant::RunaheadLimited { max_finished } = class.variant {
            tracing::info!(
                "{} max runahead: {} tasks",
                instance.identity(),
                max_finished
            );
        }

        instance
    }

    pub fn class(&self) -> &'static TaskClass {
        self.class
    }

    pub fn class_name(&self) -> &'static str {
        self.class.name
    }

    pub fn ref_time(&self) -> RefTime {
        self.ref_time
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn abdicated(&self) -> bool {
        self.abdicated
    }

    pub fn latest_message(&self) -> &str {
        &self.latest_message
    }

    pub fn prerequisites(&self) -> &RequisiteSet {
        &self.prerequisites
    }

    pub fn postrequisites(&self) -> &RequisiteSet {
        &self.postrequisites
    }

    pub fn identity(&self) -> String {
        format!("{}%{}", self.class.name, self.ref_time)
    }

    pub fn display(&self) -> String {
        format!("{}({})", self.class.name, self.ref_time)
    }

    /// The cycle of this instance's successor.
    pub fn next_ref_time(&self) -> RefTime {
        self.ref_time.next(self.class.valid_hours)
    }

    /// Satisfy my prerequisites from another instance's satisfied
    /// postrequisites. One step of the scheduler's matching pass.
    pub fn satisfy_from(&mut self, other: &TaskInstance) {
        self.prerequisites.satisfy_me(&other.postrequisites);
    }

    /// Hypothetical matching over the whole pool: would my prerequisites be
    /// fully satisfied, without mutating anything? Used for planning and
    /// display.
    pub fn will_get_satisfaction(&self, pool: &[TaskInstance]) -> bool {
        let mut probe = self.prerequisites.clone();
        for other in pool {
            probe.satisfy_me(&other.postrequisites);
        }
        probe.all_satisfied()
    }

    /// The dispatch decision: whether this instance should launch now.
    ///
    /// Holds while any earlier instance of the same class is unfinished
    /// (within-class serialisation), while a runahead-limited class has too
    /// many finished instances in the pool, and of course while any
    /// prerequisite is unsatisfied.
    pub fn can_run(&self, pool: &[TaskInstance]) -> bool {
        if self.state != TaskState::Waiting {
            return false;
        }

        for other in pool {
            if other.class.name == self.class.name
                && other.ref_time < self.ref_time
                && other.state != TaskState::Finished
            {
                tracing::debug!("{} blocked by {}", self.identity(), other.identity());
                return false;
            }
        }

        if let Variant::RunaheadLimited { max_finished } = self.class.variant {
            let finished = pool
                .iter()
                .filter(|t| t.class.name == self.class.name && t.state == TaskState::Finished)
                .count();
            if finished >= max_finished {
                return false;
            }
        }

        self.prerequisites.all_satisfied()
    }

    /// Record that the external job has been launched.
    pub fn set_running(&mut self) {
        self.state = TaskState::Running;
    }

    /// One-shot: a finished instance reports, exactly once, that its
    /// successor should be created. Returns false on every later call and
    /// for any unfinished instance.
    pub fn abdicate(&mut self) -> bool {
        if self.state == TaskState::Finished && !self.abdicated {
            self.abdicated = true;
            true
        } else {
            false
        }
    }

    /// Handle a message from the external job.
    ///
    /// A text naming one of our postrequisites marks it satisfied
    /// (idempotently, with a warning on repeats); anything else is a
    /// progress report logged at the requested severity. Messages may race
    /// state updates, so a message for a non-running instance warns but is
    /// still processed. Returns the suite-wide mode signal, if this is a
    /// fuzzy-consumer instance and the text carries one, for the scheduler
    /// to apply.
    pub fn incoming(&mut self, severity: Severity, text: &str) -> Option<ModeSignal> {
        self.latest_message = text.to_string();

        if self.state != TaskState::Running {
            tracing::warn!("{}: message from non-running task: {}", self.identity(), text);
        }

        if self.postrequisites.exists(text) {
            if self.postrequisites.satisfied(text) {
                tracing::warn!(
                    "{}: postrequisite already satisfied: {}",
                    self.identity(),
                    text
                );
            } else {
                tracing::info!("{}: {}", self.identity(), text);
                self.postrequisites.set_satisfied(text);
            }
        } else {
            match severity {
                Severity::Normal => tracing::info!("{}: {}", self.identity(), text),
                Severity::Critical => tracing::error!("{}: {}", self.identity(), text),
                Severity::Warning | Severity::Custom => {
                    tracing::warn!("{}: {}", self.identity(), text)
                }
            }
        }

        if self.state != TaskState::Finished && self.postrequisites.all_satisfied() {
            tracing::debug!("{} finished", self.identity());
            self.state = TaskState::Finished;
        }

        if self.class.variant == Variant::FuzzyConsumer {
            if let Some(caps) = mode_signal_re().captures(text) {
                let stamp = self.ref_time.to_string();
                if caps.get(2).map(|m| m.as_str()) == Some(stamp.as_str()) {
                    return match caps.get(1).map(|m| m.as_str()) {
                        Some("CATCHUP") => Some(ModeSignal::Catchup),
                        Some("UPTODATE") => Some(ModeSignal::Uptodate),
                        _ => None,
                    };
                }
            }
        }

        None
    }
}
