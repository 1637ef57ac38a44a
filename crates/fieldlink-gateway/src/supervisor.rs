//! Listener supervision.
//!
//! Every listener and the router loop are expected to run for the life
//! of the process; any return — clean, error, or panic — is abnormal and
//! triggers a resubmission according to the configured [`RestartPolicy`].
//! Tasks are tracked in a `JoinSet` and resubmitted from their completion
//! notifications, so the task census stays fixed no matter how many
//! restarts happen.

use crate::GatewayError;
use fieldlink_core::RestartPolicy;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info};

type TaskFactory = Arc<dyn Fn() -> BoxFuture<'static, Result<(), GatewayError>> + Send + Sync>;

/// A named, restartable unit of work.
///
/// The factory is invoked once per (re)start, so the task owns no state
/// across restarts — failure simply means its future resolved.
pub struct SupervisedTask {
    name: String,
    factory: TaskFactory,
}

impl SupervisedTask {
    /// Create a task from a future factory.
    pub fn new<F, Fut>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), GatewayError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(move || factory().boxed()),
        }
    }

    /// The task's display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Outcome of one task invocation, with panics captured.
type TaskOutcome = Result<Result<(), GatewayError>, Box<dyn std::any::Any + Send>>;

/// Keeps a fixed set of tasks running forever.
pub struct Supervisor {
    policy: RestartPolicy,
    tasks: Vec<SupervisedTask>,
}

impl Supervisor {
    /// Create a supervisor with the given restart policy.
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            tasks: Vec::new(),
        }
    }

    /// Register a task to supervise.
    pub fn register(&mut self, task: SupervisedTask) {
        self.tasks.push(task);
    }

    /// Number of registered tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Run all registered tasks, restarting per policy.
    ///
    /// Under `RestartPolicy::Always` this never returns. Under
    /// `UntilSuccess` it returns once every task has retired with a
    /// clean completion.
    pub async fn run(self) -> Result<(), GatewayError> {
        let mut set: JoinSet<(usize, TaskOutcome)> = JoinSet::new();
        for index in 0..self.tasks.len() {
            self.submit(&mut set, index, Duration::ZERO);
        }
        info!("supervisor running {} tasks", self.tasks.len());

        while let Some(joined) = set.join_next().await {
            let (index, outcome) = match joined {
                Ok(entry) => entry,
                Err(e) => {
                    // Panics are caught inside the task, so a join error
                    // means the runtime is shutting down.
                    error!("supervised task join failed: {e}");
                    continue;
                }
            };
            let name = self.tasks[index].name();

            let succeeded = match outcome {
                Ok(Ok(())) => {
                    info!("task {name} completed");
                    true
                }
                Ok(Err(e)) => {
                    error!("task {name} stopped running: {e}");
                    false
                }
                Err(_) => {
                    error!("task {name} panicked");
                    false
                }
            };

            match self.policy {
                RestartPolicy::Always { .. } => {
                    self.submit(&mut set, index, self.policy.restart_delay());
                }
                RestartPolicy::UntilSuccess => {
                    if succeeded {
                        info!("task {name} retired");
                    } else {
                        self.submit(&mut set, index, Duration::ZERO);
                    }
                }
            }
        }

        info!("all supervised tasks retired");
        Ok(())
    }

    /// Submit one task into the set, optionally after a restart delay.
    fn submit(&self, set: &mut JoinSet<(usize, TaskOutcome)>, index: usize, delay: Duration) {
        let factory = self.tasks[index].factory.clone();
        set.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let outcome = AssertUnwindSafe(factory()).catch_unwind().await;
            (index, outcome)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink_channels::ChannelError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failing_task(counter: Arc<AtomicUsize>) -> SupervisedTask {
        SupervisedTask::new("always-failing", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::Channel(ChannelError::Closed))
            }
        })
    }

    async fn wait_for_count(counter: &Arc<AtomicUsize>, target: usize) {
        tokio::time::timeout(Duration::from_secs(30), async {
            while counter.load(Ordering::SeqCst) < target {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("restart target not reached in time");
    }

    #[tokio::test]
    async fn test_always_policy_restarts_failures() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(RestartPolicy::Always { delay_secs: 0 });
        supervisor.register(failing_task(counter.clone()));

        let handle = tokio::spawn(supervisor.run());
        wait_for_count(&counter, 10).await;
        handle.abort();
    }

    #[tokio::test]
    async fn test_thousand_restarts_stay_schedulable() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(RestartPolicy::Always { delay_secs: 0 });
        supervisor.register(failing_task(counter.clone()));
        assert_eq!(supervisor.task_count(), 1);

        let handle = tokio::spawn(supervisor.run());
        wait_for_count(&counter, 1000).await;
        // Still restarting after the thousandth invocation.
        wait_for_count(&counter, 1005).await;
        handle.abort();
    }

    #[tokio::test]
    async fn test_always_policy_restarts_successes_too() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(RestartPolicy::Always { delay_secs: 0 });
        let task_counter = counter.clone();
        supervisor.register(SupervisedTask::new("clean-exit", move || {
            let counter = task_counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        let handle = tokio::spawn(supervisor.run());
        wait_for_count(&counter, 5).await;
        handle.abort();
    }

    #[tokio::test]
    async fn test_until_success_retires_after_first_clean_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(RestartPolicy::UntilSuccess);
        let task_counter = counter.clone();
        supervisor.register(SupervisedTask::new("flaky", move || {
            let counter = task_counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(GatewayError::Channel(ChannelError::Closed))
                } else {
                    Ok(())
                }
            }
        }));

        supervisor.run().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panicking_task_is_restarted() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(RestartPolicy::UntilSuccess);
        let task_counter = counter.clone();
        supervisor.register(SupervisedTask::new("panicky", move || {
            let counter = task_counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    panic!("listener blew up");
                }
                Ok(())
            }
        }));

        supervisor.run().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_multiple_tasks_all_retire() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new(RestartPolicy::UntilSuccess);
        for name in ["one", "two", "three"] {
            let counter = counter.clone();
            supervisor.register(SupervisedTask::new(name, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }));
        }
        assert_eq!(supervisor.task_count(), 3);

        supervisor.run().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
