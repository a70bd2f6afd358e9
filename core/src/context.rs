//! Execution contexts a completion can be delivered on.

use std::fmt;
use std::io;
use std::sync::mpsc;
use std::thread;

use tokio::runtime::Handle;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where a request's completion runs.
#[derive(Clone, Debug)]
pub enum CompletionContext {
    /// Spawned as a task on the given runtime.
    Runtime(Handle),
    /// Run on a dedicated serial queue.
    Queue(CompletionQueue),
}

impl CompletionContext {
    pub(crate) fn dispatch(&self, job: Job) {
        match self {
            CompletionContext::Runtime(handle) => {
                handle.spawn(async move { job() });
            }
            CompletionContext::Queue(queue) => queue.dispatch(job),
        }
    }
}

impl From<CompletionQueue> for CompletionContext {
    fn from(queue: CompletionQueue) -> Self {
        CompletionContext::Queue(queue)
    }
}

impl From<Handle> for CompletionContext {
    fn from(handle: Handle) -> Self {
        CompletionContext::Runtime(handle)
    }
}

/// A named thread that runs submitted jobs one at a time, in order.
///
/// The thread exits once every clone of the queue has been dropped and the
/// jobs already sent have run.
#[derive(Clone)]
pub struct CompletionQueue {
    name: String,
    sender: mpsc::Sender<Job>,
}

impl CompletionQueue {
    pub fn new(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        thread::Builder::new().name(name.clone()).spawn(move || {
            for job in receiver {
                job();
            }
        })?;
        Ok(Self { name, sender })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn dispatch(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!(queue = %self.name, "completion queue thread is gone");
        }
    }
}

impl fmt::Debug for CompletionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionQueue").field("name", &self.name).finish()
    }
}
