//! The single consumer of the event queue.
//!
//! One spawned task repeatedly dequeues, marks the event as processing,
//! dispatches it and marks it done. Exactly one event is dispatched at a
//! time, across all identity keys.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::event_dispatcher::EventDispatcher;
use super::event_queue::EventQueue;
use crate::domain::models::{Event, EventLoopConfig};

type InFlight = Arc<Mutex<Option<Arc<Event>>>>;

struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The single consumer of an [`EventQueue`].
pub struct EventLoop {
    queue: EventQueue,
    dispatcher: Arc<EventDispatcher>,
    shutdown_grace: Duration,
    running: Arc<AtomicBool>,
    events_processed: Arc<AtomicU64>,
    in_flight: InFlight,
    run: Mutex<Option<RunHandle>>,
}

impl EventLoop {
    /// Stopped loop consuming `queue` into `dispatcher`.
    pub fn new(queue: EventQueue, dispatcher: Arc<EventDispatcher>, config: &EventLoopConfig) -> Self {
        Self {
            queue,
            dispatcher,
            shutdown_grace: config.shutdown_grace(),
            running: Arc::new(AtomicBool::new(false)),
            events_processed: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(Mutex::new(None)),
            run: Mutex::new(None),
        }
    }

    /// Spawn the consumer task. Returns `false` if the loop is already
    /// running, in which case nothing is started.
    pub fn start(&self) -> bool {
        let mut run = lock(&self.run);
        if run.is_some() {
            tracing::warn!("event loop already running; ignoring start");
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(consume(
            self.queue.clone(),
            Arc::clone(&self.dispatcher),
            cancel.clone(),
            Arc::clone(&self.in_flight),
            Arc::clone(&self.events_processed),
        ));
        *run = Some(RunHandle { cancel, task });
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("event loop started");
        true
    }

    /// Stop the consumer.
    ///
    /// A loop blocked waiting for work stops at once. An in-flight dispatch
    /// gets `shutdown_grace` to finish; after that the task is aborted and
    /// the interrupted event is marked done.
    pub async fn stop(&self) {
        let run = {
            let mut run = lock(&self.run);
            self.running.store(false, Ordering::SeqCst);
            run.take()
        };
        let Some(RunHandle { cancel, mut task }) = run else {
            tracing::debug!("event loop not running; nothing to stop");
            return;
        };

        cancel.cancel();
        match tokio::time::timeout(self.shutdown_grace, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "event loop task failed"),
            Err(_) => {
                tracing::warn!(
                    grace_ms = self.shutdown_grace.as_millis() as u64,
                    "in-flight dispatch did not finish within shutdown grace; aborting"
                );
                task.abort();
                let _ = task.await;
                if let Some(event) = lock(&self.in_flight).take() {
                    self.queue.mark_done(&event);
                }
            }
        }
        tracing::info!(
            events_processed = self.events_processed(),
            "event loop stopped"
        );
    }

    /// Whether the consumer task is live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Events fully dispatched since construction.
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }
}

async fn consume(
    queue: EventQueue,
    dispatcher: Arc<EventDispatcher>,
    cancel: CancellationToken,
    in_flight: InFlight,
    events_processed: Arc<AtomicU64>,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = queue.dequeue() => event,
        };

        queue.mark_processing(&event);
        *lock(&in_flight) = Some(Arc::clone(&event));

        let span = tracing::info_span!(
            "event.dispatch",
            event_type = %event.event_type(),
            event_id = %event.id(),
            identity_key = %event.identity_key(),
        );
        let outcome = dispatcher.dispatch(&event).instrument(span).await;
        tracing::debug!(
            event_id = %event.id(),
            invoked = outcome.invoked,
            failed = outcome.failed,
            "event dispatched"
        );

        queue.mark_done(&event);
        lock(&in_flight).take();
        events_processed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EventType;
    use crate::services::event_dispatcher::handler_fn;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::timeout;

    fn config(grace_ms: u64) -> EventLoopConfig {
        EventLoopConfig {
            handler_timeout_ms: 0,
            shutdown_grace_ms: grace_ms,
        }
    }

    async fn counting_dispatcher(event_type: EventType) -> (Arc<EventDispatcher>, Arc<AtomicUsize>) {
        let dispatcher = Arc::new(EventDispatcher::new());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        dispatcher
            .register(
                event_type,
                Arc::new(handler_fn("count", move |_event| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })),
            )
            .await;
        (dispatcher, count)
    }

    #[tokio::test]
    async fn test_processes_enqueued_events() {
        let queue = EventQueue::new();
        let (dispatcher, count) = counting_dispatcher(EventType::Message).await;
        let event_loop = EventLoop::new(queue.clone(), dispatcher, &config(1000));

        assert!(event_loop.start());
        queue.enqueue(Event::message("C1", None), None).await;
        queue.enqueue(Event::message("C2", None), None).await;

        timeout(Duration::from_secs(2), queue.wait_idle())
            .await
            .expect("queue should drain");
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(event_loop.events_processed(), 2);

        event_loop.stop().await;
    }

    #[tokio::test]
    async fn test_double_start_is_a_no_op() {
        let queue = EventQueue::new();
        let (dispatcher, count) = counting_dispatcher(EventType::Summary).await;
        let event_loop = EventLoop::new(queue.clone(), dispatcher, &config(1000));

        assert!(event_loop.start());
        assert!(!event_loop.start());
        assert!(event_loop.is_running());

        queue.enqueue(Event::tick(EventType::Summary), None).await;
        timeout(Duration::from_secs(2), queue.wait_idle())
            .await
            .expect("queue should drain");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        event_loop.stop().await;
    }

    #[tokio::test]
    async fn test_stop_while_waiting_returns_promptly() {
        let queue = EventQueue::new();
        let (dispatcher, _count) = counting_dispatcher(EventType::Message).await;
        let event_loop = EventLoop::new(queue, dispatcher, &config(10_000));

        event_loop.start();
        tokio::time::sleep(Duration::from_millis(20)).await;

        timeout(Duration::from_millis(200), event_loop.stop())
            .await
            .expect("stop should not wait for new work");
        assert!(!event_loop.is_running());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let queue = EventQueue::new();
        let (dispatcher, count) = counting_dispatcher(EventType::Message).await;
        let event_loop = EventLoop::new(queue.clone(), dispatcher, &config(1000));

        assert!(event_loop.start());
        event_loop.stop().await;
        assert!(!event_loop.is_running());

        assert!(event_loop.start());
        assert!(event_loop.is_running());
        queue.enqueue(Event::message("C1", None), None).await;
        timeout(Duration::from_secs(2), queue.wait_idle())
            .await
            .expect("queue should drain");
        assert_eq!(count.load(Ordering::SeqCst), 1);

        event_loop.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_harmless() {
        let (dispatcher, _count) = counting_dispatcher(EventType::Message).await;
        let event_loop = EventLoop::new(EventQueue::new(), dispatcher, &config(1000));
        event_loop.stop().await;
        assert!(!event_loop.is_running());
    }

    #[tokio::test]
    async fn test_dispatches_one_event_at_a_time() {
        let queue = EventQueue::new();
        let dispatcher = Arc::new(EventDispatcher::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let (a, m) = (Arc::clone(&active), Arc::clone(&max_active));
        dispatcher
            .register(
                EventType::Message,
                Arc::new(handler_fn("overlap", move |_event| {
                    let (active, max_active) = (Arc::clone(&a), Arc::clone(&m));
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })),
            )
            .await;

        let event_loop = EventLoop::new(queue.clone(), dispatcher, &config(1000));
        event_loop.start();
        for channel in ["C1", "C2", "C3", "C4"] {
            queue.enqueue(Event::message(channel, None), None).await;
        }

        timeout(Duration::from_secs(2), queue.wait_idle())
            .await
            .expect("queue should drain");
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(event_loop.events_processed(), 4);

        event_loop.stop().await;
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_the_loop() {
        let queue = EventQueue::new();
        let dispatcher = Arc::new(EventDispatcher::new());
        dispatcher
            .register(
                EventType::Message,
                Arc::new(handler_fn("fails", |_event| async {
                    Err(anyhow::anyhow!("always fails"))
                })),
            )
            .await;

        let event_loop = EventLoop::new(queue.clone(), dispatcher, &config(1000));
        event_loop.start();
        queue.enqueue(Event::message("C1", None), None).await;
        queue.enqueue(Event::message("C2", None), None).await;

        timeout(Duration::from_secs(2), queue.wait_idle())
            .await
            .expect("queue should drain");
        assert_eq!(event_loop.events_processed(), 2);
        assert!(event_loop.is_running());

        event_loop.stop().await;
    }

    #[tokio::test]
    async fn test_stop_aborts_after_grace_and_releases_key() {
        let queue = EventQueue::new();
        let dispatcher = Arc::new(EventDispatcher::new());
        dispatcher
            .register(
                EventType::Message,
                Arc::new(handler_fn("stuck", |_event| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                })),
            )
            .await;

        let event_loop = EventLoop::new(queue.clone(), dispatcher, &config(50));
        event_loop.start();
        queue.enqueue(Event::message("C1", None), None).await;

        // Wait until the handler holds the event.
        timeout(Duration::from_secs(1), async {
            while !queue.is_processing("message:C1:") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("event should be picked up");

        timeout(Duration::from_secs(1), event_loop.stop())
            .await
            .expect("stop should respect the grace period");
        assert!(!queue.is_processing("message:C1:"));
        assert_eq!(event_loop.events_processed(), 0);
    }
}
