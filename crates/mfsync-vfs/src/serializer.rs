//! Exclusive mutation context.
//!
//! Every operation that mutates the shared tree or the visible content of a
//! file is funneled through one `MutationSerializer` task, which runs them
//! one at a time in submission order. Callers await the result through a
//! oneshot reply; nothing is held locked while a caller waits on I/O.
//!
//! ```text
//! ┌──────────────┐    MutationOp    ┌───────────────────┐
//! │ sync / fetch │ ───────────────► │ MutationSerializer│
//! │   workers    │                  │       task        │
//! └──────────────┘                  └───────────────────┘
//!        ▲        result via oneshot          │
//!        └────────────────────────────────────┘
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::VfsError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// One queued mutation
pub struct MutationOp {
    job: Job,
}

/// Cloneable handle submitting work to the serializer task
#[derive(Clone)]
pub struct MutationHandle {
    tx: mpsc::Sender<MutationOp>,
}

impl MutationHandle {
    /// Runs `f` inside the exclusive mutation context and returns its result
    ///
    /// # Errors
    ///
    /// `ExecutorStopped` if the serializer task has ended or dropped the
    /// operation without running it.
    pub async fn run<T, F>(&self, f: F) -> Result<T, VfsError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            // The caller may have given up waiting; the work still ran.
            let _ = reply.send(f());
        });

        self.tx
            .send(MutationOp { job })
            .await
            .map_err(|_| VfsError::ExecutorStopped)?;

        rx.await.map_err(|_| VfsError::ExecutorStopped)
    }
}

/// Runs queued mutations sequentially
pub struct MutationSerializer {
    rx: mpsc::Receiver<MutationOp>,
}

impl MutationSerializer {
    /// Creates the serializer and its submission handle
    ///
    /// The caller must drive the serializer with [`MutationSerializer::run`]
    /// (or use [`MutationSerializer::spawn`]).
    pub fn new(capacity: usize) -> (Self, MutationHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { rx }, MutationHandle { tx })
    }

    /// Creates the serializer and spawns it on the current runtime
    pub fn spawn(capacity: usize) -> (MutationHandle, JoinHandle<()>) {
        let (serializer, handle) = Self::new(capacity);
        let task = tokio::spawn(serializer.run());
        (handle, task)
    }

    /// Processes operations until every handle is dropped
    pub async fn run(mut self) {
        tracing::debug!("Mutation serializer started");

        while let Some(op) = self.rx.recv().await {
            (op.job)();
        }

        tracing::debug!("Mutation serializer stopped (all handles dropped)");
    }
}
