//! Subsystem verification orchestrator.
//!
//! Opens one file, fans out one worker per registered subsystem, joins
//! them all, closes the file, and merges the outcomes.
//!
//! # Graceful Degradation
//!
//! - Invalid input: rejected before the engine is touched
//! - Open failure: fatal for the file, no partial results
//! - Subsystem error or panic: caught per worker and recorded as an
//!   engine failure; the other subsystems still report
//! - Close failure: logged, results are kept
//!
//! Every worker is joined before the handle is closed. Workers write to
//! their own result slot; slots are merged only after the join.

use crate::engine::result::{SubsystemOutcome, VerificationRun};
use crate::engine::VerificationEngine;
use crate::geopackage::{GeoPackage, GeoPackageEngine};
use crate::{
    checks, Subsystem, VerificationError, VerificationIssue, VerificationLevel, VerifierError,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Function producing the issues of one subsystem
pub type VerifyFn<H> =
    Box<dyn Fn(&H, VerificationLevel) -> Result<Vec<VerificationIssue>, VerificationError> + Send + Sync>;

/// A subsystem paired with the function that verifies it
pub struct SubsystemTask<H> {
    pub subsystem: Subsystem,
    pub verify_fn: VerifyFn<H>,
}

impl<H> SubsystemTask<H> {
    pub fn new<F>(subsystem: Subsystem, verify_fn: F) -> Self
    where
        F: Fn(&H, VerificationLevel) -> Result<Vec<VerificationIssue>, VerificationError>
            + Send
            + Sync
            + 'static,
    {
        SubsystemTask {
            subsystem,
            verify_fn: Box::new(verify_fn),
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Level handed to every subsystem function
    pub level: VerificationLevel,
}

/// Verification orchestrator
pub struct VerificationOrchestrator<E: VerificationEngine> {
    engine: E,
    config: OrchestratorConfig,
    tasks: Vec<SubsystemTask<E::Handle>>,
}

impl<E: VerificationEngine> VerificationOrchestrator<E> {
    /// Create an orchestrator with no registered subsystems
    pub fn new(engine: E, config: OrchestratorConfig) -> Self {
        VerificationOrchestrator {
            engine,
            config,
            tasks: Vec::new(),
        }
    }

    /// Register a subsystem task, replacing any task for the same subsystem
    pub fn register_task(&mut self, task: SubsystemTask<E::Handle>) {
        if self.tasks.iter().any(|t| t.subsystem == task.subsystem) {
            debug!(subsystem = %task.subsystem, "replacing registered subsystem task");
            self.tasks.retain(|t| t.subsystem != task.subsystem);
        }
        self.tasks.push(task);
    }

    pub fn register_tasks(&mut self, tasks: Vec<SubsystemTask<E::Handle>>) {
        for task in tasks {
            self.register_task(task);
        }
    }

    /// Registered subsystems, in registration order
    pub fn subsystems(&self) -> Vec<Subsystem> {
        self.tasks.iter().map(|t| t.subsystem.clone()).collect()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Verify one file with every registered subsystem
    pub fn run_all(&self, path: &Path) -> Result<VerificationRun, VerifierError> {
        let start = Instant::now();
        validate_input(path)?;

        info!(file = %path.display(), subsystems = self.tasks.len(), "verifying file");

        // Validation happens per subsystem, not at open time
        let handle = self.engine.open(path, VerificationLevel::None)?;

        let outcomes = self.run_tasks(&handle);

        if let Err(e) = self.engine.close(handle) {
            warn!(file = %path.display(), error = %e, "failed to close file after verification");
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let run = VerificationRun::from_outcomes(path, outcomes, duration_ms);

        info!(
            file = %path.display(),
            issues = run.results.issue_count(),
            failed_subsystems = run.failures.len(),
            duration_ms,
            "verification finished"
        );

        Ok(run)
    }

    /// Run every task on its own scoped thread and join them all
    fn run_tasks(&self, handle: &E::Handle) -> Vec<(Subsystem, SubsystemOutcome)> {
        let level = self.config.level;

        thread::scope(|s| {
            let workers: Vec<_> = self
                .tasks
                .iter()
                .map(|task| {
                    let worker = s.spawn(move || execute_task(task, handle, level));
                    (task.subsystem.clone(), worker)
                })
                .collect();

            workers
                .into_iter()
                .map(|(subsystem, worker)| {
                    let outcome = worker.join().unwrap_or_else(|payload| {
                        SubsystemOutcome::EngineFailure(panic_message(payload.as_ref()))
                    });
                    (subsystem, outcome)
                })
                .collect()
        })
    }
}

impl<E> VerificationOrchestrator<E>
where
    E: VerificationEngine + 'static,
    E::Handle: 'static,
{
    /// Verify `path` on a background coordinating thread.
    ///
    /// Returns immediately; the result is delivered through the handle.
    pub fn spawn(self: &Arc<Self>, path: impl Into<PathBuf>) -> VerificationHandle {
        let file = path.into();
        let (sender, receiver) = mpsc::channel();
        let orchestrator = Arc::clone(self);
        let target = file.clone();

        let thread = thread::Builder::new()
            .name("gpkg-verify".to_string())
            .spawn(move || {
                let result = orchestrator.run_all(&target);
                // Receiver may already be gone if the caller dropped the handle
                let _ = sender.send(result);
            });

        let thread = match thread {
            Ok(thread) => Some(thread),
            Err(e) => {
                let (sender, receiver) = mpsc::channel();
                let _ = sender.send(Err(VerifierError::Io {
                    context: "spawning verification thread".to_string(),
                    source: e,
                }));
                return VerificationHandle {
                    file,
                    receiver,
                    thread: None,
                    ready: None,
                };
            }
        };

        VerificationHandle {
            file,
            receiver,
            thread,
            ready: None,
        }
    }
}

/// Pending result of a spawned verification
pub struct VerificationHandle {
    file: PathBuf,
    receiver: Receiver<Result<VerificationRun, VerifierError>>,
    thread: Option<JoinHandle<()>>,
    ready: Option<Result<VerificationRun, VerifierError>>,
}

impl VerificationHandle {
    /// File being verified
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// True once the coordinating thread has delivered its result
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Poll for the result without blocking.
    ///
    /// The result stays with the handle; `wait` returns it afterwards.
    pub fn try_result(&mut self) -> Option<&Result<VerificationRun, VerifierError>> {
        if self.ready.is_none() {
            match self.receiver.try_recv() {
                Ok(result) => self.ready = Some(result),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.ready = Some(Err(VerifierError::Interrupted {
                        path: self.file.clone(),
                    }))
                }
            }
        }
        self.ready.as_ref()
    }

    /// Block until the result is available
    pub fn wait(mut self) -> Result<VerificationRun, VerifierError> {
        let result = match self.ready.take() {
            Some(result) => result,
            None => self.receiver.recv().unwrap_or_else(|_| {
                Err(VerifierError::Interrupted {
                    path: self.file.clone(),
                })
            }),
        };

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(file = %self.file.display(), "verification thread panicked");
            }
        }

        result
    }
}

/// Reject inputs that cannot be verified before touching the engine
pub fn validate_input(path: &Path) -> Result<(), VerifierError> {
    let invalid = |reason: String| VerifierError::InvalidInput {
        path: path.to_path_buf(),
        reason,
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty".to_string()));
    }

    let metadata = std::fs::metadata(path).map_err(|e| invalid(e.to_string()))?;
    if metadata.is_dir() {
        return Err(invalid("path is a directory".to_string()));
    }

    std::fs::File::open(path).map_err(|e| invalid(format!("file is not readable: {}", e)))?;

    Ok(())
}

/// Run one task, converting errors and panics into an engine failure
fn execute_task<H>(
    task: &SubsystemTask<H>,
    handle: &H,
    level: VerificationLevel,
) -> SubsystemOutcome {
    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| (task.verify_fn)(handle, level)));
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(issues)) => {
            debug!(
                subsystem = %task.subsystem,
                issues = issues.len(),
                elapsed_ms,
                "subsystem verified"
            );
            SubsystemOutcome::from_issues(issues)
        }
        Ok(Err(e)) => {
            warn!(subsystem = %task.subsystem, error = %e, "subsystem verification failed");
            SubsystemOutcome::EngineFailure(e.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(subsystem = %task.subsystem, panic = %message, "subsystem verification panicked");
            SubsystemOutcome::EngineFailure(message)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("verification panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("verification panicked: {}", message)
    } else {
        "verification panicked".to_string()
    }
}

impl VerificationOrchestrator<GeoPackageEngine> {
    /// Orchestrator with the five fixed subsystems registered
    pub fn with_default_subsystems(engine: GeoPackageEngine, config: OrchestratorConfig) -> Self {
        let mut orchestrator = VerificationOrchestrator::new(engine, config);
        orchestrator.register_tasks(create_default_tasks());
        orchestrator
    }
}

/// Create the five fixed subsystem tasks over the SQLite-backed engine
pub fn create_default_tasks() -> Vec<SubsystemTask<GeoPackage>> {
    vec![
        SubsystemTask::new(Subsystem::Core, checks::core::verify),
        SubsystemTask::new(Subsystem::Tiles, checks::tiles::verify),
        SubsystemTask::new(Subsystem::Extensions, checks::extensions::verify),
        SubsystemTask::new(Subsystem::Schema, checks::schema::verify),
        SubsystemTask::new(Subsystem::Metadata, checks::metadata::verify),
    ]
}
