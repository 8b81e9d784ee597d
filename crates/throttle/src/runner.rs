//! Bounded fan-out over independent asynchronous actions.
//!
//! Every action waits on one shared [`ResizableSemaphore`], so at most
//! `max_concurrency` action bodies run at the same time. A failing action
//! never cancels its siblings. Results always come back in input order.

use crate::error::TaskError;
use crate::gate::ResizableSemaphore;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress callback, invoked with the number of finished actions so far.
pub type ProgressFn = Arc<dyn Fn(usize) + Send + Sync>;

/// Runs collections of actions under a shared concurrency limit.
///
/// Two result modes are offered and callers choose per call site:
/// [`TaskRunner::collect`] keeps every outcome, [`TaskRunner::try_all`] is
/// all-or-nothing.
#[derive(Clone)]
pub struct TaskRunner {
    gate: ResizableSemaphore,
    cancel: CancellationToken,
    progress: Option<ProgressFn>,
}

impl TaskRunner {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            gate: ResizableSemaphore::new(max_concurrency),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Abort pending and running actions when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report completions to `callback`.
    ///
    /// The callback runs on a separate task, so a slow callback delays only
    /// its own notifications and never the actions.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.gate.capacity()
    }

    /// Resize the limit, including for runs already in progress.
    pub fn set_max_concurrency(&self, max_concurrency: usize) {
        self.gate.set_capacity(max_concurrency);
    }

    pub fn gate(&self) -> &ResizableSemaphore {
        &self.gate
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run every action and keep every outcome, in input order.
    pub async fn collect<I, Fut, T, E>(&self, actions: I) -> Vec<Result<T, TaskError<E>>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.drive(actions).await
    }

    /// Run every action and return all values, or the failure of the
    /// earliest action (by input position) that failed.
    ///
    /// Siblings of a failed action still run to completion, so their side
    /// effects happen either way.
    pub async fn try_all<I, Fut, T, E>(&self, actions: I) -> Result<Vec<T>, TaskError<E>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.drive(actions).await.into_iter().collect()
    }

    async fn drive<I, Fut, T, E>(&self, actions: I) -> Vec<Result<T, TaskError<E>>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let started = Instant::now();

        let mut running: FuturesUnordered<_> = actions
            .into_iter()
            .enumerate()
            .map(|(index, action)| self.admit(index, action))
            .collect();

        let total = running.len();
        if total == 0 {
            return Vec::new();
        }

        debug!(
            total,
            max_concurrency = self.gate.capacity(),
            "Starting bounded run"
        );

        let progress = ProgressReporter::start(self.progress.clone());
        let mut slots: Vec<Option<Result<T, TaskError<E>>>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        let mut failed = 0;

        while let Some((index, outcome)) = running.next().await {
            completed += 1;
            if let Err(err) = &outcome {
                failed += 1;
                if !err.is_canceled() {
                    debug!(action = index, error = %err, "Action failed");
                }
            }
            progress.report(completed);
            slots[index] = Some(outcome);
        }

        progress.finish().await;

        info!(
            total,
            succeeded = total - failed,
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bounded run finished"
        );

        slots.into_iter().flatten().collect()
    }

    /// Wait for a permit, run the action, give the permit back.
    async fn admit<Fut, T, E>(&self, index: usize, action: Fut) -> (usize, Result<T, TaskError<E>>)
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match self.gate.acquire_with(&self.cancel).await {
            Ok(permit) => permit,
            Err(err) => return (index, Err(err.into())),
        };

        // Dropping the action on cancellation aborts whatever it awaits.
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TaskError::Canceled),
            result = action => result.map_err(TaskError::Failed),
        };

        permit.release();
        (index, outcome)
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("gate", &self.gate)
            .field("canceled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Forwards completion counts to the user callback on its own task.
struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<usize>>,
    worker: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    fn start(callback: Option<ProgressFn>) -> Self {
        let Some(callback) = callback else {
            return Self {
                sender: None,
                worker: None,
            };
        };

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(async move {
            while let Some(completed) = receiver.recv().await {
                callback(completed);
            }
        });

        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    fn report(&self, completed: usize) {
        if let Some(sender) = &self.sender {
            // The worker only stops once the sender is gone.
            let _ = sender.send(completed);
        }
    }

    /// Flush outstanding notifications.
    async fn finish(mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "Progress callback panicked");
            }
        }
    }
}
