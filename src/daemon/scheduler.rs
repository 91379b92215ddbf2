use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::daemon::launcher::JobLauncher;
use crate::errors::SchedulerError;
use crate::models::config::SuiteConfig;
use crate::models::message::TaskMessage;
use crate::models::ref_time::RefTime;
use crate::models::task::{InitialState, ModeSignal, TaskInstance, TaskState};
use crate::registry::{self, TaskClass, TemplateContext};

// ---------------------------------------------------------------------------
// TaskPool
// ---------------------------------------------------------------------------

/// The live pool of task instances, unique per `(class, ref_time)`, plus the
/// suite-wide template context the fuzzy consumer's mode signals mutate.
///
/// The pool is owned by the scheduler and only ever touched from its thread
/// of control; within one pass the matching step completes for every
/// instance before any dispatch decision is taken.
#[derive(Debug)]
pub struct TaskPool {
    instances: Vec<TaskInstance>,
    ctx: TemplateContext,
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPool {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            ctx: TemplateContext::default(),
        }
    }

    /// Build the initial pool from a suite configuration.
    pub fn seed(config: &SuiteConfig) -> Result<Self, SchedulerError> {
        let start = config.start()?;
        let mut pool = Self::new();
        for entry in &config.tasks {
            let initial: InitialState = entry.state.parse()?;
            pool.insert(&entry.class, start, initial)?;
        }
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[TaskInstance] {
        &self.instances
    }

    pub fn catchup_mode(&self) -> bool {
        self.ctx.catchup_mode
    }

    pub fn contains(&self, class: &str, ref_time: RefTime) -> bool {
        self.get(class, ref_time).is_some()
    }

    pub fn get(&self, class: &str, ref_time: RefTime) -> Option<&TaskInstance> {
        self.instances
            .iter()
            .find(|t| t.class_name() == class && t.ref_time() == ref_time)
    }

    /// Create an instance of `class` at (or after, per valid hours) the
    /// requested cycle and add it to the pool.
    pub fn insert(
        &mut self,
        class: &str,
        requested: RefTime,
        initial: InitialState,
    ) -> Result<(), SchedulerError> {
        let class = registry::lookup(class)?;
        let instance = TaskInstance::spawn(class, requested, initial, &self.ctx);
        if self.contains(instance.class_name(), instance.ref_time()) {
            return Err(SchedulerError::DuplicateInstance(instance.identity()));
        }
        tracing::info!("inserted {}", instance.display());
        self.instances.push(instance);
        Ok(())
    }

    /// Route an incoming message to its addressed instance, applying any
    /// suite-wide mode signal it carries. Messages for unknown or departed
    /// instances are logged and dropped.
    pub fn deliver(&mut self, msg: &TaskMessage) {
        let (class, stamp) = match msg.split_id() {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!("undeliverable message: {}", e);
                return;
            }
        };
        let ref_time: RefTime = match stamp.parse() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!("undeliverable message for {}: {}", msg.task_id, e);
                return;
            }
        };
        let Some(instance) = self
            .instances
            .iter_mut()
            .find(|t| t.class_name() == class && t.ref_time() == ref_time)
        else {
            tracing::warn!("message for unknown task {}: {}", msg.task_id, msg.text);
            return;
        };
        if let Some(signal) = instance.incoming(msg.severity, &msg.text) {
            self.apply_mode_signal(signal);
        }
    }

    fn apply_mode_signal(&mut self, signal: ModeSignal) {
        match (self.ctx.catchup_mode, signal) {
            (true, ModeSignal::Catchup) | (false, ModeSignal::Uptodate) => {
                tracing::debug!("mode signal repeats the current operation, ignored");
            }
            (false, ModeSignal::Catchup) => {
                // falling behind real time again
                self.ctx.catchup_mode = true;
                tracing::warn!("beginning CATCHUP operation");
            }
            (true, ModeSignal::Uptodate) => {
                self.ctx.catchup_mode = false;
                tracing::info!("beginning UPTODATE operation");
            }
        }
    }

    /// The matching pass: every instance offers its satisfied
    /// postrequisites to every other instance's prerequisites.
    pub fn match_requisites(&mut self) {
        for i in 0..self.instances.len() {
            let (left, rest) = self.instances.split_at_mut(i);
            let (instance, right) = rest.split_first_mut().expect("i < len");
            for other in left.iter().chain(right.iter()) {
                instance.satisfy_from(other);
            }
        }
    }

    /// The dispatch pass: launch every instance whose dispatch decision
    /// passes. A failed launch leaves the instance waiting, to be retried
    /// on a later pass while its prerequisites still hold.
    pub async fn dispatch(&mut self, launcher: &dyn JobLauncher) {
        let ready: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, t)| t.can_run(&self.instances))
            .map(|(i, _)| i)
            .collect();

        for i in ready {
            let class = self.instances[i].class();
            let ref_time = self.instances[i].ref_time();
            match launcher.launch(class, ref_time).await {
                Ok(()) => self.instances[i].set_running(),
                Err(e) => {
                    tracing::warn!(
                        "dispatch of {} failed, will retry: {}",
                        self.instances[i].identity(),
                        e
                    );
                }
            }
        }
    }

    /// The abdication pass: each newly finished instance creates its
    /// same-class successor at the next valid cycle, exactly once.
    pub fn create_successors(&mut self) {
        let mut successors: Vec<(&'static TaskClass, RefTime)> = Vec::new();
        for instance in &mut self.instances {
            if instance.abdicate() {
                successors.push((instance.class(), instance.next_ref_time()));
            }
        }
        for (class, ref_time) in successors {
            if !self.contains(class.name, ref_time) {
                let successor =
                    TaskInstance::spawn(class, ref_time, InitialState::Waiting, &self.ctx);
                tracing::info!("abdication: inserted {}", successor.display());
                self.instances.push(successor);
            }
        }
    }

    /// Remove a finished, abdicated instance. Retirement policy lives
    /// outside the core; this is the hook an external driver (or operator)
    /// calls. Returns false when no such instance exists or it has not yet
    /// finished and abdicated.
    pub fn retire(&mut self, class: &str, ref_time: RefTime) -> bool {
        let pos = self.instances.iter().position(|t| {
            t.class_name() == class
                && t.ref_time() == ref_time
                && t.state() == TaskState::Finished
                && t.abdicated()
        });
        match pos {
            Some(pos) => {
                let removed = self.instances.remove(pos);
                tracing::info!("retired {}", removed.display());
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// The scheduler loop. Owns the pool and the inbound mailbox; wakes on
/// message arrival or on a periodic tick, then runs one full pass of
/// matching, dispatch and abdication.
pub struct Scheduler {
    pool: TaskPool,
    mailbox: mpsc::Receiver<TaskMessage>,
    launcher: Arc<dyn JobLauncher>,
    tick: Duration,
    processing_required: bool,
}

impl Scheduler {
    pub fn new(
        pool: TaskPool,
        mailbox: mpsc::Receiver<TaskMessage>,
        launcher: Arc<dyn JobLauncher>,
        tick: Duration,
    ) -> Self {
        Self {
            pool,
            mailbox,
            launcher,
            tick,
            // run the first pass immediately so seeded source tasks launch
            // without waiting for a message
            processing_required: true,
        }
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    /// Run until the mailbox closes.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            "scheduler started with {} task instances",
            self.pool.len()
        );
        loop {
            if !self.processing_required {
                tokio::select! {
                    maybe = self.mailbox.recv() => match maybe {
                        Some(msg) => {
                            self.processing_required = true;
                            self.pool.deliver(&msg);
                        }
                        None => {
                            tracing::info!("mailbox closed, scheduler stopping");
                            break;
                        }
                    },
                    _ = tokio::time::sleep(self.tick) => {}
                }
            }
            self.step().await;
        }
        Ok(())
    }

    /// One full pass: drain queued messages, then match, dispatch and
    /// abdicate. Matching completes for the whole pool before the first
    /// dispatch decision.
    pub async fn step(&mut self) {
        self.processing_required = false;
        while let Ok(msg) = self.mailbox.try_recv() {
            self.processing_required = true;
            self.pool.deliver(&msg);
        }
        self.pool.match_requisites();
        self.pool.dispatch(&*self.launcher).await;
        self.pool.create_successors();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
