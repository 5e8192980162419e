//! Deduplicating, delay-capable event queue.
//!
//! Producers call [`EventQueue::enqueue`]; the event loop is the single
//! consumer of [`EventQueue::dequeue`]. Per identity key the queue tracks at
//! most one *pending* event (latest wins) and at most one *processing*
//! event (in flight). The FIFO only carries hints: an entry whose event is no
//! longer the current pending event for its key is stale and skipped on
//! dequeue, so superseding never has to remove anything from the channel.
//!
//! Delayed enqueues run on cancellable timers keyed by identity. A newer
//! enqueue for the same key cancels the outstanding timer and waits for the
//! timer task to finish before installing its own state, so a cancelled
//! timer can never resurrect a stale event.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::domain::models::{Event, EventId};

/// An outstanding delayed enqueue.
struct DelayedEnqueue {
    event_id: EventId,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct QueueState {
    pending: HashMap<String, Arc<Event>>,
    processing: HashMap<String, Arc<Event>>,
    delay_tasks: HashMap<String, DelayedEnqueue>,
    /// Current pending events popped while their key was still in flight;
    /// re-pushed onto the FIFO by `mark_done`.
    deferred: HashMap<String, Arc<Event>>,
}

impl QueueState {
    fn is_current(&self, key: &str, event: &Event) -> bool {
        self.pending.get(key).is_some_and(|p| p.id() == event.id())
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.processing.is_empty() && self.delay_tasks.is_empty()
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    fifo_tx: mpsc::UnboundedSender<Arc<Event>>,
    fifo_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<Event>>>,
    changed: Notify,
}

impl QueueInner {
    // Critical sections never panic midway, so a poisoned lock still guards
    // consistent maps.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `event` the current pending event for `key` and push it.
    fn install(&self, state: &mut QueueState, key: String, event: Arc<Event>) {
        state.pending.insert(key, Arc::clone(&event));
        // The receiver lives inside the same struct, so the channel is open.
        let _ = self.fifo_tx.send(event);
    }

    /// Body of a delayed enqueue once its timer elapses.
    fn fire_delayed(&self, key: String, event: Arc<Event>) {
        let mut state = self.lock();
        let ours = state
            .delay_tasks
            .get(&key)
            .is_some_and(|task| task.event_id == event.id());
        if !ours {
            // Cancelled or cleared after the sleep finished.
            tracing::debug!(identity_key = %key, event_id = %event.id(), "delayed enqueue superseded before firing");
            return;
        }
        state.delay_tasks.remove(&key);
        tracing::debug!(identity_key = %key, event_id = %event.id(), "delayed enqueue fired");
        self.install(&mut state, key, event);
        drop(state);
        self.changed.notify_waiters();
    }
}

/// The deduplicating event queue. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<QueueInner>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    /// Empty queue.
    pub fn new() -> Self {
        let (fifo_tx, fifo_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                fifo_tx,
                fifo_rx: tokio::sync::Mutex::new(fifo_rx),
                changed: Notify::new(),
            }),
        }
    }

    /// Enqueue an event, immediately or after `delay`.
    ///
    /// Any outstanding delayed enqueue for the same identity key is cancelled
    /// (and its task awaited) first. A zero delay counts as immediate.
    pub async fn enqueue(&self, event: Event, delay: Option<Duration>) {
        let key = event.identity_key();
        self.cancel_delayed(&key).await;

        let event = Arc::new(event);
        match delay.filter(|d| !d.is_zero()) {
            None => {
                tracing::debug!(
                    identity_key = %key,
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    "event enqueued"
                );
                let mut state = self.inner.lock();
                self.inner.install(&mut state, key, event);
            }
            Some(delay) => {
                tracing::debug!(
                    identity_key = %key,
                    event_id = %event.id(),
                    delay_ms = delay.as_millis() as u64,
                    "delayed enqueue scheduled"
                );
                let event_id = event.id();
                let inner = Arc::clone(&self.inner);
                let timer_key = key.clone();
                // Spawn under the lock so the timer cannot look for its slot
                // before the slot exists.
                let mut state = self.inner.lock();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.fire_delayed(timer_key, event);
                });
                state.delay_tasks.insert(key, DelayedEnqueue { event_id, handle });
            }
        }
        self.inner.changed.notify_waiters();
    }

    /// Cancel the outstanding delayed enqueue for `key`, waiting for the
    /// timer task to wind down. Returns whether a timer was cancelled.
    async fn cancel_delayed(&self, key: &str) -> bool {
        let task = self.inner.lock().delay_tasks.remove(key);
        let Some(task) = task else {
            return false;
        };
        task.handle.abort();
        match task.handle.await {
            Ok(()) => {
                tracing::debug!(identity_key = %key, "delayed enqueue finished while being cancelled");
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!(identity_key = %key, "delayed enqueue cancelled");
            }
            Err(e) => {
                tracing::warn!(identity_key = %key, error = %e, "delayed enqueue task failed");
            }
        }
        true
    }

    /// Wait for the next current event.
    ///
    /// Stale FIFO entries (superseded or cleared) are discarded. An event
    /// whose key is still being processed is held back until `mark_done`
    /// releases it. Cancel-safe: dropping the future never loses an event.
    pub async fn dequeue(&self) -> Arc<Event> {
        let mut rx = self.inner.fifo_rx.lock().await;
        loop {
            let Some(event) = rx.recv().await else {
                // The sender is owned by the queue itself.
                return std::future::pending().await;
            };
            let key = event.identity_key();
            let mut state = self.inner.lock();

            if !state.is_current(&key, &event) {
                tracing::trace!(identity_key = %key, event_id = %event.id(), "skipping stale event");
                continue;
            }

            let in_flight = state
                .processing
                .get(&key)
                .is_some_and(|p| p.id() != event.id());
            if in_flight {
                tracing::debug!(identity_key = %key, event_id = %event.id(), "holding event until in-flight work completes");
                state.deferred.insert(key, event);
                continue;
            }

            return event;
        }
    }

    /// Move `event` from pending to processing.
    pub fn mark_processing(&self, event: &Arc<Event>) {
        let key = event.identity_key();
        let mut state = self.inner.lock();
        if state.is_current(&key, event) {
            state.pending.remove(&key);
        }
        state.processing.insert(key, Arc::clone(event));
        drop(state);
        self.inner.changed.notify_waiters();
    }

    /// Finish `event`, releasing any work held back behind it.
    pub fn mark_done(&self, event: &Arc<Event>) {
        let key = event.identity_key();
        let mut state = self.inner.lock();

        if state.processing.get(&key).is_some_and(|p| p.id() == event.id()) {
            state.processing.remove(&key);
        }
        if state.is_current(&key, event) {
            state.pending.remove(&key);
        }

        if !state.processing.contains_key(&key) {
            if let Some(held) = state.deferred.remove(&key) {
                if state.is_current(&key, &held) {
                    tracing::debug!(identity_key = %key, event_id = %held.id(), "releasing held event");
                    let _ = self.inner.fifo_tx.send(held);
                }
            }
        }
        drop(state);
        self.inner.changed.notify_waiters();
    }

    /// Cancel every delayed enqueue and forget all pending and processing
    /// state. FIFO entries left behind become stale and are skipped.
    pub async fn clear(&self) {
        let tasks: Vec<(String, DelayedEnqueue)> = {
            let mut state = self.inner.lock();
            state.pending.clear();
            state.processing.clear();
            state.deferred.clear();
            state.delay_tasks.drain().collect()
        };

        for (key, task) in tasks {
            task.handle.abort();
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(identity_key = %key, error = %e, "delayed enqueue task failed");
                }
            }
        }
        tracing::debug!("event queue cleared");
        self.inner.changed.notify_waiters();
    }

    /// Resolve once nothing is pending, processing or delayed.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Keys with a pending event.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Keys with an event in flight.
    pub fn processing_len(&self) -> usize {
        self.inner.lock().processing.len()
    }

    /// Outstanding delayed enqueues.
    pub fn delayed_len(&self) -> usize {
        self.inner.lock().delay_tasks.len()
    }

    /// Whether `key` has an event waiting.
    pub fn is_pending(&self, key: &str) -> bool {
        self.inner.lock().pending.contains_key(key)
    }

    /// Whether `key` has an event in flight.
    pub fn is_processing(&self, key: &str) -> bool {
        self.inner.lock().processing.contains_key(key)
    }

    /// Whether `key` has a delayed enqueue outstanding.
    pub fn has_delayed(&self, key: &str) -> bool {
        self.inner.lock().delay_tasks.contains_key(key)
    }
}
