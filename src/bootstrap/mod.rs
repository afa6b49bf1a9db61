// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bootstrap orchestration for background tasks.
//!
//! The host framework registers named background tasks (controllers,
//! reachability probes, usage flushers) any number of times before its
//! listener is about to bind, then fires the go signal exactly once. Every
//! task runs as an independent tokio task sharing one shutdown signal; a slow
//! or failing task never delays another. Each spawned task is tracked
//! through an explicit handle exposing its lifecycle state, so callers and
//! tests wait on observed transitions instead of timing.

pub mod reachability;
pub mod usage;

use crate::admission::errors::{ConfigResult, ConfigurationError, TaskError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use reachability::{ReachabilityGate, ReachabilityProbe, ReachabilityStatus};
pub use usage::{UsageAggregator, UsageFlusher, UsageKey, UsageRecord, UsageSink};

/// BackgroundTask is a long-running, cancellable unit of work started once
/// during bootstrap.
///
/// The run function is invoked exactly once by the orchestrator. It must
/// observe the shutdown signal and return promptly once it fires; there is no
/// preemptive cancellation. It must not assume any relative ordering versus
/// other tasks except through shared resources constructed earlier.
#[async_trait]
pub trait BackgroundTask: Send + Sync {
    /// Run until completion or until the shutdown signal fires.
    async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), TaskError>;
}

/// TaskState is the lifecycle state of a registered background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered, go signal not yet fired.
    Pending,
    /// Spawned and running.
    Running,
    /// Returned cleanly, normally in response to shutdown.
    Stopped,
    /// Run returned a terminal error. Never restarted by the orchestrator;
    /// restart policy belongs to the surrounding process supervisor.
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "Pending"),
            TaskState::Running => write!(f, "Running"),
            TaskState::Stopped => write!(f, "Stopped"),
            TaskState::Failed => write!(f, "Failed"),
        }
    }
}

/// TaskHandle tracks one spawned background task.
pub struct TaskHandle {
    name: String,
    state: watch::Receiver<TaskState>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// The unique task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The task's current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Wait until the task reaches the target state, up to the given grace
    /// period. Returns true if the state was observed in time.
    pub async fn await_state(&mut self, target: TaskState, grace: Duration) -> bool {
        let reached = tokio::time::timeout(grace, async {
            loop {
                if *self.state.borrow_and_update() == target {
                    return true;
                }
                if self.state.changed().await.is_err() {
                    return *self.state.borrow() == target;
                }
            }
        })
        .await;
        matches!(reached, Ok(true))
    }

    /// Wait for the task's spawned future to finish.
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

struct RegisteredTask {
    name: String,
    task: Arc<dyn BackgroundTask>,
}

/// BootstrapOrchestrator owns the set of registered background tasks, the
/// single go signal, and the shared shutdown signal.
pub struct BootstrapOrchestrator {
    tasks: Vec<RegisteredTask>,
    names: HashSet<String>,
    shutdown_tx: watch::Sender<bool>,
    started: bool,
}

impl BootstrapOrchestrator {
    /// Create a new orchestrator with no tasks registered.
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            tasks: Vec::new(),
            names: HashSet::new(),
            shutdown_tx,
            started: false,
        }
    }

    /// Register a named background task. Registration is only valid before
    /// the go signal; duplicate names are a build-time error.
    pub fn register(&mut self, name: &str, task: Arc<dyn BackgroundTask>) -> ConfigResult<()> {
        if self.started {
            return Err(ConfigurationError::AlreadyStarted);
        }
        if !self.names.insert(name.to_string()) {
            return Err(ConfigurationError::DuplicateTask(name.to_string()));
        }
        self.tasks.push(RegisteredTask {
            name: name.to_string(),
            task,
        });
        Ok(())
    }

    /// Register a closure as a background task.
    pub fn register_fn<F, Fut>(&mut self, name: &str, f: F) -> ConfigResult<()>
    where
        F: Fn(watch::Receiver<bool>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.register(name, Arc::new(FnTask { f }))
    }

    /// A receiver for the shared shutdown signal, for collaborators that are
    /// not orchestrator-owned tasks.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Fire the go signal: spawn every registered task as an independent
    /// tokio task. Valid exactly once, when the host's listener is about to
    /// bind; must be called from within a tokio runtime.
    pub fn start(&mut self) -> ConfigResult<Vec<TaskHandle>> {
        if self.started {
            return Err(ConfigurationError::AlreadyStarted);
        }
        self.started = true;

        let mut handles = Vec::with_capacity(self.tasks.len());
        for registered in &self.tasks {
            let (state_tx, state_rx) = watch::channel(TaskState::Pending);
            let shutdown_rx = self.shutdown_tx.subscribe();
            let task = Arc::clone(&registered.task);
            let name = registered.name.clone();

            let join = tokio::spawn(async move {
                let _ = state_tx.send(TaskState::Running);
                info!(task = %name, "background task running");
                match task.run(shutdown_rx).await {
                    Ok(()) => {
                        info!(task = %name, "background task stopped");
                        let _ = state_tx.send(TaskState::Stopped);
                    }
                    Err(err) => {
                        warn!(task = %name, error = %err, "background task failed");
                        let _ = state_tx.send(TaskState::Failed);
                    }
                }
            });

            handles.push(TaskHandle {
                name: registered.name.clone(),
                state: state_rx,
                join,
            });
        }
        Ok(handles)
    }

    /// Fire the shared shutdown signal. Cancellation is cooperative; every
    /// running task is expected to observe the signal and stop promptly.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for BootstrapOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

struct FnTask<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> BackgroundTask for FnTask<F>
where
    F: Fn(watch::Receiver<bool>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), TaskError> {
        (self.f)(shutdown).await
    }
}

/// Wait on the shared shutdown signal. Resolves when the signal fires or the
/// orchestrator is dropped.
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
