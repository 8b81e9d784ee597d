//! Resizable admission gate.
//!
//! A counting semaphore whose capacity can be changed while permits are
//! outstanding. Waiters are admitted strictly in arrival order, and a waiter
//! that gives up (cancellation, disposal, or simply dropping the `acquire`
//! future) never consumes capacity.

use crate::error::GateError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One caller parked in the wait queue.
#[derive(Debug)]
struct Waiter {
    id: u64,
    grant: oneshot::Sender<()>,
}

#[derive(Debug)]
struct State {
    capacity: usize,
    in_flight: usize,
    waiters: VecDeque<Waiter>,
    next_waiter: u64,
    disposed: bool,
}

impl State {
    /// Grant queued waiters, head first, while capacity allows.
    fn dispatch(&mut self) {
        while self.in_flight < self.capacity {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            // A closed receiver means the waiter is already gone.
            if waiter.grant.send(()).is_ok() {
                self.in_flight += 1;
            }
        }
    }

    /// Return one unit. Saturates at zero: a surplus release is a bug in the
    /// caller, caught by the debug assertion, and ignored in release builds.
    fn release_one(&mut self) {
        debug_assert!(self.in_flight > 0, "gate released more often than acquired");
        self.in_flight = self.in_flight.saturating_sub(1);
        self.dispatch();
    }
}

/// Counting admission gate with runtime-adjustable capacity.
///
/// Cloning is cheap and yields a handle to the same gate.
#[derive(Debug, Clone)]
pub struct ResizableSemaphore {
    state: Arc<Mutex<State>>,
}

impl ResizableSemaphore {
    /// Create a gate admitting at most `capacity` holders at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                capacity,
                in_flight: 0,
                waiters: VecDeque::new(),
                next_waiter: 0,
                disposed: false,
            })),
        }
    }

    /// A gate that never makes anyone wait until it is resized.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Change the capacity.
    ///
    /// Growing admits queued waiters immediately, in FIFO order, before this
    /// returns. Shrinking never revokes permits already handed out; it only
    /// holds back future admissions until enough holders release.
    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.state.lock();
        let previous = state.capacity;
        state.capacity = capacity;
        state.dispatch();

        debug!(
            previous,
            capacity,
            in_flight = state.in_flight,
            waiting = state.waiters.len(),
            "Gate capacity changed"
        );
    }

    /// Wait for admission with no way to give up other than dropping the
    /// returned future.
    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        self.acquire_inner(None).await
    }

    /// Wait for admission, failing with [`GateError::Canceled`] if `cancel`
    /// fires first.
    pub async fn acquire_with(&self, cancel: &CancellationToken) -> Result<GatePermit, GateError> {
        self.acquire_inner(Some(cancel)).await
    }

    async fn acquire_inner(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<GatePermit, GateError> {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(GateError::Canceled);
        }

        let (id, receiver) = {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(GateError::Disposed);
            }

            // Fast path only when nobody is queued, so latecomers cannot
            // overtake earlier waiters.
            if state.waiters.is_empty() && state.in_flight < state.capacity {
                state.in_flight += 1;
                return Ok(GatePermit::new(Arc::clone(&self.state)));
            }

            let id = state.next_waiter;
            state.next_waiter += 1;
            let (grant, receiver) = oneshot::channel();
            state.waiters.push_back(Waiter { id, grant });
            (id, receiver)
        };

        let mut pending = PendingAcquire {
            state: &self.state,
            id,
            receiver,
            settled: false,
        };

        let wake = match cancel {
            Some(token) => tokio::select! {
                biased;
                granted = &mut pending.receiver => Wake::from_grant(granted.is_ok()),
                _ = token.cancelled() => Wake::Canceled,
            },
            None => Wake::from_grant((&mut pending.receiver).await.is_ok()),
        };

        match wake {
            Wake::Granted => {
                pending.settled = true;
                Ok(GatePermit::new(Arc::clone(&self.state)))
            }
            Wake::Disposed => {
                pending.settled = true;
                Err(GateError::Disposed)
            }
            Wake::Canceled => {
                pending.abandon();
                debug!(waiter = id, "Gate admission canceled");
                Err(GateError::Canceled)
            }
        }
    }

    /// Permanently shut the gate. Every queued waiter fails with
    /// [`GateError::Disposed`], as does every later `acquire`. Permits already
    /// granted stay valid and may still be released. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;

        let abandoned = state.waiters.len();
        // Dropping the senders wakes every waiter with a closed channel.
        state.waiters.clear();

        info!(abandoned, in_flight = state.in_flight, "Gate disposed");
    }

    /// Dispose the gate once `shutdown` fires.
    ///
    /// The watcher holds only a weak reference, so it does not keep the gate
    /// alive. It does stay parked until the token fires; abort the returned
    /// handle to stop watching earlier.
    pub fn dispose_on(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let state = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            shutdown.cancelled().await;
            if let Some(state) = state.upgrade() {
                ResizableSemaphore { state }.dispose();
            }
        })
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Number of callers queued for admission.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Free units right now (zero while shrunk below the in-flight count).
    pub fn available(&self) -> usize {
        let state = self.state.lock();
        state.capacity.saturating_sub(state.in_flight)
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl Default for ResizableSemaphore {
    fn default() -> Self {
        Self::unbounded()
    }
}

enum Wake {
    Granted,
    Disposed,
    Canceled,
}

impl Wake {
    fn from_grant(granted: bool) -> Self {
        if granted {
            Wake::Granted
        } else {
            Wake::Disposed
        }
    }
}

/// Queue registration owned by an in-progress `acquire`.
///
/// If the future is dropped before it settles, the registration is undone:
/// the waiter leaves the queue, or, when the grant raced the drop, the unit
/// goes straight back to the gate.
struct PendingAcquire<'a> {
    state: &'a Mutex<State>,
    id: u64,
    receiver: oneshot::Receiver<()>,
    settled: bool,
}

impl PendingAcquire<'_> {
    fn abandon(&mut self) {
        if self.settled {
            return;
        }
        self.settled = true;

        let mut state = self.state.lock();
        if let Some(position) = state.waiters.iter().position(|w| w.id == self.id) {
            state.waiters.remove(position);
        } else if self.receiver.try_recv().is_ok() {
            // Granted under the lock before we got here.
            state.release_one();
        }
    }
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        self.abandon();
    }
}

/// One unit of admission. Released on [`GatePermit::release`] or drop,
/// whichever comes first, and never twice.
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct GatePermit {
    state: Option<Arc<Mutex<State>>>,
}

impl GatePermit {
    fn new(state: Arc<Mutex<State>>) -> Self {
        Self { state: Some(state) }
    }

    /// Return the unit to the gate, admitting the next waiter if any.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(state) = self.state.take() {
            state.lock().release_one();
        }
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::time::Duration;

    async fn wait_for_waiters(gate: &ResizableSemaphore, count: usize) {
        while gate.waiting() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_acquire_and_release_restore_capacity() {
        let gate = ResizableSemaphore::new(3);

        let permits: Vec<_> = [(); 3]
            .iter()
            .map(|_| gate.acquire().now_or_never().unwrap().unwrap())
            .collect();
        assert_eq!(gate.in_flight(), 3);
        assert_eq!(gate.available(), 0);

        for permit in permits {
            permit.release();
        }
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn test_saturated_gate_blocks() {
        let gate = ResizableSemaphore::new(2);
        let _a = gate.acquire().await.unwrap();
        let _b = gate.acquire().await.unwrap();

        assert!(gate.acquire().now_or_never().is_none());
        // The dropped attempt must not linger in the queue.
        assert_eq!(gate.waiting(), 0);
        assert_eq!(gate.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_unbounded_never_blocks() {
        let gate = ResizableSemaphore::unbounded();
        let permits: Vec<_> = (0..1000)
            .map(|_| gate.acquire().now_or_never().unwrap().unwrap())
            .collect();
        assert_eq!(gate.in_flight(), 1000);
        drop(permits);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fifo_admission() {
        let gate = ResizableSemaphore::new(1);
        let holder = gate.acquire().await.unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for name in ["a", "b", "c"] {
            let gate_clone = gate.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let permit = gate_clone.acquire().await.unwrap();
                order.lock().push(name);
                permit.release();
            }));
            wait_for_waiters(&gate, handles.len()).await;
        }

        holder.release();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_growing_admits_waiters_synchronously() {
        let gate = ResizableSemaphore::new(0);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate_clone = gate.clone();
            handles.push(tokio::spawn(async move { gate_clone.acquire().await }));
        }
        wait_for_waiters(&gate, 3).await;

        gate.set_capacity(2);
        assert_eq!(gate.in_flight(), 2);
        assert_eq!(gate.waiting(), 1);

        gate.set_capacity(3);
        assert_eq!(gate.in_flight(), 3);
        assert_eq!(gate.waiting(), 0);

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_shrinking_does_not_preempt_holders() {
        let gate = ResizableSemaphore::new(3);
        let a = gate.acquire().await.unwrap();
        let b = gate.acquire().await.unwrap();
        let c = gate.acquire().await.unwrap();

        gate.set_capacity(1);
        assert_eq!(gate.in_flight(), 3);
        assert_eq!(gate.available(), 0);

        a.release();
        b.release();
        assert_eq!(gate.in_flight(), 1);
        assert!(gate.acquire().now_or_never().is_none());

        c.release();
        let d = gate.acquire().now_or_never().unwrap().unwrap();
        assert_eq!(gate.in_flight(), 1);
        drop(d);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_keeps_capacity() {
        let gate = ResizableSemaphore::new(1);
        let holder = gate.acquire().await.unwrap();
        let token = CancellationToken::new();

        let waiter = {
            let gate = gate.clone();
            let token = token.clone();
            tokio::spawn(async move { gate.acquire_with(&token).await })
        };
        wait_for_waiters(&gate, 1).await;

        token.cancel();
        assert_eq!(waiter.await.unwrap().unwrap_err(), GateError::Canceled);
        assert_eq!(gate.waiting(), 0);
        assert_eq!(gate.in_flight(), 1);

        holder.release();
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_precanceled_token_fails_fast() {
        let gate = ResizableSemaphore::new(5);
        let token = CancellationToken::new();
        token.cancel();

        let result = gate.acquire_with(&token).await;
        assert_eq!(result.unwrap_err(), GateError::Canceled);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_grant_to_abandoned_waiter_is_returned() {
        let gate = ResizableSemaphore::new(1);
        let holder = gate.acquire().await.unwrap();

        let mut pending = Box::pin(gate.acquire());
        assert!(futures::poll!(&mut pending).is_pending());
        assert_eq!(gate.waiting(), 1);

        // The grant lands on a waiter that is about to be dropped.
        holder.release();
        assert_eq!(gate.in_flight(), 1);

        drop(pending);
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_dispose_fails_waiters_and_future_acquires() {
        let gate = ResizableSemaphore::new(1);
        let holder = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await })
        };
        wait_for_waiters(&gate, 1).await;

        gate.dispose();
        gate.dispose();
        assert!(gate.is_disposed());
        assert_eq!(waiter.await.unwrap().unwrap_err(), GateError::Disposed);
        assert_eq!(gate.acquire().await.unwrap_err(), GateError::Disposed);

        // Outstanding permits can still be handed back.
        holder.release();
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_on_shutdown_token() {
        let gate = ResizableSemaphore::new(0);
        let shutdown = CancellationToken::new();
        let watcher = gate.dispose_on(shutdown.clone());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await })
        };
        wait_for_waiters(&gate, 1).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.cancel();
        watcher.await.unwrap();

        assert_eq!(waiter.await.unwrap().unwrap_err(), GateError::Disposed);
    }

    #[tokio::test]
    async fn test_dispose_watcher_does_not_keep_gate_alive() {
        let gate = ResizableSemaphore::new(1);
        let state = Arc::downgrade(&gate.state);
        let shutdown = CancellationToken::new();
        let watcher = gate.dispose_on(shutdown.clone());

        drop(gate);
        assert!(state.upgrade().is_none());

        shutdown.cancel();
        watcher.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_in_middle_of_queue_keeps_order() {
        let gate = ResizableSemaphore::new(1);
        let holder = gate.acquire().await.unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let tokens: Vec<_> = (0..3).map(|_| CancellationToken::new()).collect();

        let mut handles = Vec::new();
        for (name, token) in ["a", "b", "c"].into_iter().zip(tokens.iter().cloned()) {
            let gate_clone = gate.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let permit = gate_clone.acquire_with(&token).await?;
                order.lock().push(name);
                permit.release();
                Ok::<_, GateError>(())
            }));
            wait_for_waiters(&gate, handles.len()).await;
        }

        tokens[1].cancel();
        while gate.waiting() > 2 {
            tokio::task::yield_now().await;
        }
        holder.release();

        let outcomes: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(outcomes, vec![Ok(()), Err(GateError::Canceled), Ok(())]);
        assert_eq!(*order.lock(), vec!["a", "c"]);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_in_flight_tracks_capacity_across_resizes() {
        let gate = ResizableSemaphore::new(3);
        let mut holders: Vec<_> = (0..3)
            .map(|_| gate.acquire().now_or_never().unwrap().unwrap())
            .collect();

        let mut queued: Vec<_> = (0..3).map(|_| Box::pin(gate.acquire())).collect();
        for pending in queued.iter_mut() {
            assert!(futures::poll!(pending).is_pending());
        }
        assert_eq!((gate.in_flight(), gate.waiting()), (3, 3));

        // Shrinking leaves the holders alone and admits nobody.
        gate.set_capacity(1);
        assert_eq!((gate.in_flight(), gate.waiting(), gate.available()), (3, 3, 0));

        holders.pop().unwrap().release();
        assert_eq!((gate.in_flight(), gate.waiting()), (2, 3));
        holders.pop().unwrap().release();
        assert_eq!((gate.in_flight(), gate.waiting()), (1, 3));

        // Back under the limit: exactly one waiter moves up.
        holders.pop().unwrap().release();
        assert_eq!((gate.in_flight(), gate.waiting(), gate.available()), (1, 2, 0));

        gate.set_capacity(2);
        assert_eq!((gate.in_flight(), gate.waiting(), gate.available()), (2, 1, 0));

        gate.set_capacity(0);
        assert_eq!((gate.in_flight(), gate.waiting(), gate.available()), (2, 1, 0));

        let mut granted = Vec::new();
        for pending in queued.iter_mut().take(2) {
            match futures::poll!(pending) {
                std::task::Poll::Ready(permit) => granted.push(permit.unwrap()),
                std::task::Poll::Pending => panic!("granted waiter still pending"),
            }
        }
        assert!(futures::poll!(&mut queued[2]).is_pending());

        for permit in granted {
            permit.release();
            assert!(gate.in_flight() <= 1);
            assert_eq!(gate.waiting(), 1);
        }
        assert_eq!(gate.in_flight(), 0);

        gate.set_capacity(5);
        assert_eq!((gate.in_flight(), gate.waiting(), gate.available()), (1, 0, 4));
        drop(queued);
        assert_eq!((gate.in_flight(), gate.available()), (0, 5));
    }
}
