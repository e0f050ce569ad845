//! Post-response background work.
//!
//! A response may carry a chain of deferred tasks that run strictly after
//! its terminal frame has been accepted by the transport, in registration
//! order. Failures never become response content (the response is already
//! sent); they are reported through the process error channel only.

use std::any::Any;

use futures::FutureExt;
use futures::future::BoxFuture;
use std::panic::AssertUnwindSafe;

/// One deferred unit of work.
enum Task {
    /// Awaited inline on the request's task.
    Async(BoxFuture<'static, anyhow::Result<()>>),
    /// Run on the blocking pool so it cannot stall concurrent requests.
    Blocking(Box<dyn FnOnce() -> anyhow::Result<()> + Send>),
}

/// An ordered chain of deferred tasks attached to a response.
#[derive(Default)]
pub struct BackgroundTasks {
    tasks: Vec<Task>,
}

impl std::fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTasks")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl BackgroundTasks {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an asynchronous task.
    pub fn add_task<F>(&mut self, future: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.push(Task::Async(Box::pin(future)));
    }

    /// Append a synchronous task, executed on the blocking pool.
    pub fn add_blocking_task<F>(&mut self, f: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.tasks.push(Task::Blocking(Box::new(f)));
    }

    /// Chain-style variant of [`add_task`](Self::add_task).
    #[must_use]
    pub fn with_task<F>(mut self, future: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_task(future);
        self
    }

    /// Chain-style variant of [`add_blocking_task`](Self::add_blocking_task).
    #[must_use]
    pub fn with_blocking_task<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.add_blocking_task(f);
        self
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run all tasks in registration order.
    ///
    /// A failing or panicking task is logged and the chain continues; no
    /// failure is surfaced to the (already completed) response.
    pub async fn run(self) {
        for (index, task) in self.tasks.into_iter().enumerate() {
            let result = match task {
                Task::Async(future) => match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(anyhow::anyhow!(
                        "background task panicked: {}",
                        panic_message(payload.as_ref())
                    )),
                },
                Task::Blocking(f) => match tokio::task::spawn_blocking(f).await {
                    Ok(result) => result,
                    Err(join_error) => {
                        Err(anyhow::anyhow!("background task panicked: {join_error}"))
                    }
                },
            };

            if let Err(error) = result {
                tracing::error!(task = index, %error, "background task failed");
            }
        }
    }
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
