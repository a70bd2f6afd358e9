//! Per-request execution: transport call, fault classification, decoding and
//! completion dispatch.
//!
//! # Design
//! Each admitted request becomes one `RequestExecutor`, run as a single Tokio
//! task. Its lifecycle is tracked in a shared `TaskState` so the manager and
//! the caller's `TaskHandle` can cancel it from outside:
//!
//! ```text
//! Created ──> Running ──> Succeeded | Failed | Cancelled
//!    └──────────────────────────────> Cancelled
//! ```
//!
//! Every transition goes through the state mutex, which is what makes
//! delivery exactly-once and suppressed after cancellation even when the
//! abort of the underlying task loses the race with transport completion.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use serde::de::DeserializeOwned;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::config::MimePolicy;
use crate::encoder::encode;
use crate::error::ClassifiedError;
use crate::http::TransportResponse;
use crate::logging::FaultLogger;
use crate::request::RequestDescriptor;
use crate::transport::Transport;

pub(crate) type Completion<T> = Box<dyn FnOnce(Result<T, ClassifiedError>) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// State shared between an executor, its handles and the manager registry.
#[derive(Debug)]
pub(crate) struct TaskShared {
    id: Uuid,
    state: Mutex<TaskState>,
    abort: OnceLock<AbortHandle>,
}

impl TaskShared {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(TaskState::Created),
            abort: OnceLock::new(),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> TaskState {
        *self.lock()
    }

    /// `Created -> Running`. False if the task was cancelled first.
    pub(crate) fn start(&self) -> bool {
        let mut state = self.lock();
        if *state != TaskState::Created {
            return false;
        }
        *state = TaskState::Running;
        true
    }

    /// `Created -> Failed`, for a task that could not be admitted.
    pub(crate) fn reject(&self) -> bool {
        let mut state = self.lock();
        if *state != TaskState::Created {
            return false;
        }
        *state = TaskState::Failed;
        true
    }

    /// `Running -> Succeeded | Failed`. False if the task was cancelled.
    pub(crate) fn finish(&self, succeeded: bool) -> bool {
        let mut state = self.lock();
        if *state != TaskState::Running {
            return false;
        }
        *state = if succeeded {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        true
    }

    /// Moves any non-terminal task to `Cancelled` and aborts its Tokio task
    /// if one is running. Returns whether the state changed.
    pub(crate) fn cancel(&self) -> bool {
        {
            let mut state = self.lock();
            if state.is_terminal() {
                return false;
            }
            *state = TaskState::Cancelled;
        }
        if let Some(abort) = self.abort.get() {
            abort.abort();
        }
        true
    }

    pub(crate) fn set_abort_handle(&self, handle: AbortHandle) {
        if self.abort.set(handle).is_ok() && self.state() == TaskState::Cancelled {
            if let Some(abort) = self.abort.get() {
                abort.abort();
            }
        }
    }
}

/// Owns one request from admission to delivery.
pub(crate) struct RequestExecutor<T> {
    descriptor: RequestDescriptor,
    task: Arc<TaskShared>,
    transport: Arc<dyn Transport>,
    logger: Arc<dyn FaultLogger>,
    mime_policy: MimePolicy,
    completion: Completion<T>,
}

impl<T> RequestExecutor<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(
        descriptor: RequestDescriptor,
        task: Arc<TaskShared>,
        transport: Arc<dyn Transport>,
        logger: Arc<dyn FaultLogger>,
        mime_policy: MimePolicy,
        completion: Completion<T>,
    ) -> Self {
        Self {
            descriptor,
            task,
            transport,
            logger,
            mime_policy,
            completion,
        }
    }

    pub(crate) async fn run(self) {
        let task_id = self.task.id();
        if !self.task.start() {
            tracing::debug!(%task_id, "request cancelled before start");
            return;
        }
        tracing::debug!(
            %task_id,
            url = %self.descriptor.url(),
            method = self.descriptor.method().name(),
            "request started"
        );

        let request = match encode(&self.descriptor) {
            Ok(request) => request,
            Err(err) => {
                self.log(std::slice::from_ref(&err));
                self.deliver(Err(err));
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let response = transport.execute(request).await;

        if self.task.state() == TaskState::Cancelled {
            tracing::debug!(%task_id, "request cancelled during transport call");
            return;
        }

        let outcome = self.evaluate(response);
        self.deliver(outcome);
    }

    fn evaluate(&self, response: TransportResponse) -> Result<T, ClassifiedError> {
        let mut faults = collect_faults(
            &response,
            self.descriptor.expected_mime_type(),
            self.mime_policy,
        );
        match response.body {
            Some(body) if faults.is_empty() => {
                serde_json::from_slice(&body).map_err(ClassifiedError::DecodeFailure)
            }
            // A missing body always records NoResponseData, so `faults` is
            // non-empty here.
            _ => {
                self.log(&faults);
                Err(faults.remove(0))
            }
        }
    }

    fn log(&self, faults: &[ClassifiedError]) {
        if self.descriptor.log_failures() && !faults.is_empty() {
            self.logger.log_faults(&self.descriptor, faults);
        }
    }

    fn deliver(self, outcome: Result<T, ClassifiedError>) {
        let task_id = self.task.id();
        if !self.task.finish(outcome.is_ok()) {
            tracing::debug!(%task_id, "request cancelled; completion suppressed");
            return;
        }
        tracing::debug!(%task_id, succeeded = outcome.is_ok(), "request finished");

        let completion = self.completion;
        match self.descriptor.completion_context() {
            Some(context) => context.dispatch(Box::new(move || completion(outcome))),
            None => completion(outcome),
        }
    }
}

/// Every fault a response exhibits, in classification order.
pub(crate) fn collect_faults(
    response: &TransportResponse,
    expected_mime_type: &str,
    mime_policy: MimePolicy,
) -> Vec<ClassifiedError> {
    let mut faults = Vec::new();

    if let Some(err) = &response.error {
        faults.push(ClassifiedError::Transport(err.clone()));
    }

    if let Some(status) = response.status {
        if !(200..=299).contains(&status) {
            faults.push(ClassifiedError::BadStatusCode(status));
        }
    }

    if let Some(mime) = &response.mime_type {
        let matches = mime == expected_mime_type;
        let fault = match mime_policy {
            MimePolicy::RejectMatching => matches,
            MimePolicy::RequireMatch => !matches,
        };
        if fault {
            faults.push(ClassifiedError::BadMimeType {
                got: mime.clone(),
                expected: expected_mime_type.to_string(),
            });
        }
    }

    if response.body.is_none() {
        faults.push(ClassifiedError::NoResponseData);
    }

    faults
}
