//! Admission control for in-flight requests.
//!
//! # Design
//! `submit` never awaits. It validates the descriptor, registers the
//! executor and pushes it onto an unbounded FIFO queue. A single dispatcher
//! task drains that queue, acquiring a semaphore permit per executor before
//! spawning it, so at most `max_concurrent` executors run at once and they
//! are admitted in submission order. The permit is held by the executor task
//! and released when it finishes or is aborted.
//!
//! The registry maps task ids to handles so `cancel_all` can reach queued and
//! running executors alike. Entries are removed when the executor's task ends
//! or when the dispatcher skips a cancelled entry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Semaphore};
use uuid::Uuid;

use crate::config::{ManagerConfig, MimePolicy};
use crate::error::{ClassifiedError, ManagerError, TransportError};
use crate::executor::{RequestExecutor, TaskShared, TaskState};
use crate::logging::{FaultLogger, TracingFaultLogger};
use crate::request::RequestDescriptor;
use crate::transport::Transport;

type ExecutorFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Cancellable reference to one submitted request.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    task: Arc<TaskShared>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.task.id()
    }

    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    /// Cancel the request. A queued request never starts; a running one
    /// never delivers its completion. No effect once the request finished.
    pub fn cancel(&self) {
        if self.task.cancel() {
            tracing::debug!(task_id = %self.id(), "request cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TaskHandle {}

#[derive(Clone, Default)]
struct Registry {
    tasks: Arc<Mutex<HashMap<Uuid, TaskHandle>>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, TaskHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, handle: TaskHandle) {
        self.lock().insert(handle.id(), handle);
    }

    fn remove(&self, id: Uuid) {
        self.lock().remove(&id);
    }

    fn snapshot(&self) -> Vec<TaskHandle> {
        self.lock().values().cloned().collect()
    }
}

/// Removes a registry entry when the executor task ends, aborted or not.
struct Deregister {
    registry: Registry,
    id: Uuid,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

struct Admission {
    task: Arc<TaskShared>,
    run: ExecutorFuture,
}

/// Runs requests against a `Transport` with bounded concurrency.
pub struct RequestManager {
    transport: Arc<dyn Transport>,
    logger: Arc<dyn FaultLogger>,
    mime_policy: MimePolicy,
    max_concurrent: usize,
    registry: Registry,
    queue: mpsc::UnboundedSender<Admission>,
}

impl RequestManager {
    /// Build a manager on the current Tokio runtime.
    pub fn new(
        config: ManagerConfig,
        transport: impl Transport,
    ) -> Result<Self, ManagerError> {
        let runtime = Handle::try_current()?;
        Self::with_runtime(config, transport, runtime)
    }

    pub fn with_runtime(
        config: ManagerConfig,
        transport: impl Transport,
        runtime: Handle,
    ) -> Result<Self, ManagerError> {
        if config.max_concurrent == 0 {
            return Err(ManagerError::InvalidConcurrency);
        }

        let registry = Registry::default();
        let (queue, admissions) = mpsc::unbounded_channel();
        let slots = Arc::new(Semaphore::new(config.max_concurrent));
        runtime.spawn(dispatch(admissions, slots, registry.clone(), runtime.clone()));

        tracing::debug!(
            max_concurrent = config.max_concurrent,
            mime_policy = ?config.mime_policy,
            "request manager started"
        );

        Ok(Self {
            transport: Arc::new(transport),
            logger: Arc::new(TracingFaultLogger),
            mime_policy: config.mime_policy,
            max_concurrent: config.max_concurrent,
            registry,
            queue,
        })
    }

    /// Replace the sink that receives faults of descriptors with
    /// `log_failures` set.
    pub fn with_fault_logger(mut self, logger: impl FaultLogger) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Submitted requests that have not reached a terminal state.
    pub fn active_tasks(&self) -> usize {
        self.registry
            .snapshot()
            .iter()
            .filter(|handle| !handle.state().is_terminal())
            .count()
    }

    /// Queue `descriptor` for execution; `completion` receives the decoded
    /// body or the first classified fault.
    ///
    /// A descriptor whose URL path is too short is rejected on the spot:
    /// `completion` runs before `submit` returns and the result is `None`.
    /// The same happens with `Transport(Other(..))` when the dispatcher has
    /// stopped because its runtime shut down.
    pub fn submit<T, F>(&self, descriptor: RequestDescriptor, completion: F) -> Option<TaskHandle>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<T, ClassifiedError>) + Send + 'static,
    {
        if let Err(err) = descriptor.validate() {
            tracing::debug!(url = %descriptor.url(), "request rejected: {err}");
            completion(Err(err));
            return None;
        }

        let task = Arc::new(TaskShared::new());
        let handle = TaskHandle {
            task: Arc::clone(&task),
        };
        tracing::debug!(
            task_id = %handle.id(),
            url = %descriptor.url(),
            method = descriptor.method().name(),
            "request queued"
        );

        // Shared so the completion can still be reached if the admission
        // bounces off a stopped dispatcher.
        let slot = Arc::new(Mutex::new(Some(completion)));
        let executor_slot = Arc::clone(&slot);
        let executor = RequestExecutor::new(
            descriptor,
            Arc::clone(&task),
            Arc::clone(&self.transport),
            Arc::clone(&self.logger),
            self.mime_policy,
            Box::new(move |result| {
                if let Some(completion) = take_completion(&executor_slot) {
                    completion(result);
                }
            }),
        );
        self.registry.insert(handle.clone());

        let admission = Admission {
            task,
            run: Box::pin(executor.run()),
        };
        if let Err(mpsc::error::SendError(admission)) = self.queue.send(admission) {
            tracing::warn!(task_id = %handle.id(), "dispatcher stopped; request rejected");
            drop(admission);
            handle.task.reject();
            self.registry.remove(handle.id());
            if let Some(completion) = take_completion(&slot) {
                completion(Err(ClassifiedError::Transport(TransportError::Other(
                    "request dispatcher stopped".to_string(),
                ))));
            }
            return None;
        }
        Some(handle)
    }

    /// Like [`submit`](Self::submit), delivering through a oneshot channel.
    /// The receiver reports `RecvError` if the request is cancelled.
    pub fn submit_oneshot<T>(
        &self,
        descriptor: RequestDescriptor,
    ) -> (
        Option<TaskHandle>,
        oneshot::Receiver<Result<T, ClassifiedError>>,
    )
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = self.submit(descriptor, move |result| {
            let _ = tx.send(result);
        });
        (handle, rx)
    }

    pub fn cancel(&self, handle: &TaskHandle) {
        handle.cancel();
        self.registry.remove(handle.id());
    }

    /// Cancel every queued and running request.
    pub fn cancel_all(&self) {
        let handles = self.registry.snapshot();
        tracing::debug!(count = handles.len(), "cancelling all requests");
        for handle in &handles {
            self.cancel(handle);
        }
    }
}

fn take_completion<F>(slot: &Mutex<Option<F>>) -> Option<F> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

async fn dispatch(
    mut admissions: mpsc::UnboundedReceiver<Admission>,
    slots: Arc<Semaphore>,
    registry: Registry,
    runtime: Handle,
) {
    while let Some(Admission { task, run }) = admissions.recv().await {
        let id = task.id();
        if task.state() != TaskState::Created {
            registry.remove(id);
            continue;
        }

        let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        if task.state() != TaskState::Created {
            registry.remove(id);
            continue;
        }

        let guard = Deregister {
            registry: registry.clone(),
            id,
        };
        let join = runtime.spawn(async move {
            let _permit = permit;
            let _guard = guard;
            run.await;
        });
        task.set_abort_handle(join.abort_handle());
    }
    tracing::debug!("request dispatcher stopped");
}
