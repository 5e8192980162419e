//! Periodic tick producer.
//!
//! Enqueues one event of each tick type on start, then keeps three
//! independent timers running (autonomous check, summary, channel sync).
//! Tick types have a single workspace-wide identity, so a slow consumer sees
//! the pending tick replaced rather than a growing backlog.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::event_queue::EventQueue;
use crate::domain::models::{Event, EventType, SchedulerConfig};

struct SchedulerRun {
    cancel: CancellationToken,
    timers: Vec<JoinHandle<()>>,
}

/// Enqueues the periodic tick events.
pub struct EventScheduler {
    queue: EventQueue,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    ticks_fired: Arc<AtomicU64>,
    run: Mutex<Option<SchedulerRun>>,
}

impl EventScheduler {
    /// Stopped scheduler feeding `queue`.
    pub fn new(queue: EventQueue, config: SchedulerConfig) -> Self {
        Self {
            queue,
            config,
            running: Arc::new(AtomicBool::new(false)),
            ticks_fired: Arc::new(AtomicU64::new(0)),
            run: Mutex::new(None),
        }
    }

    fn timers(&self) -> [(EventType, Duration); 3] {
        [
            (EventType::AutonomousCheck, self.config.check_interval()),
            (EventType::Summary, self.config.summary_interval()),
            (EventType::ChannelSync, self.config.channel_sync_interval()),
        ]
    }

    /// Enqueue the initial burst and start the timers.
    ///
    /// Returns `false` without doing anything if already running.
    pub async fn start(&self) -> bool {
        let mut run = self.run.lock().await;
        if run.is_some() {
            tracing::warn!("event scheduler already running; ignoring start");
            return false;
        }

        for event_type in EventType::TICKS {
            self.queue.enqueue(Event::tick(event_type), None).await;
            self.ticks_fired.fetch_add(1, Ordering::Relaxed);
        }

        let cancel = CancellationToken::new();
        let timers = self
            .timers()
            .into_iter()
            .map(|(event_type, every)| {
                tokio::spawn(tick_every(
                    self.queue.clone(),
                    event_type,
                    every,
                    cancel.clone(),
                    Arc::clone(&self.ticks_fired),
                ))
            })
            .collect();

        *run = Some(SchedulerRun { cancel, timers });
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            check_interval_ms = self.config.check_interval_ms,
            summary_interval_ms = self.config.summary_interval_ms,
            channel_sync_interval_ms = self.config.channel_sync_interval_ms,
            "event scheduler started"
        );
        true
    }

    /// Cancel all three timers and wait for them to exit.
    pub async fn stop(&self) {
        let run = {
            let mut run = self.run.lock().await;
            self.running.store(false, Ordering::SeqCst);
            run.take()
        };
        let Some(SchedulerRun { cancel, timers }) = run else {
            tracing::debug!("event scheduler not running; nothing to stop");
            return;
        };

        cancel.cancel();
        for timer in timers {
            if let Err(e) = timer.await {
                tracing::warn!(error = %e, "scheduler timer task failed");
            }
        }
        tracing::info!("event scheduler stopped");
    }

    /// Whether the tick timers are live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Tick events enqueued so far, initial bursts included.
    pub fn ticks_fired(&self) -> u64 {
        self.ticks_fired.load(Ordering::Relaxed)
    }
}

async fn tick_every(
    queue: EventQueue,
    event_type: EventType,
    every: Duration,
    cancel: CancellationToken,
    ticks_fired: Arc<AtomicU64>,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(every) => {}
        }
        queue.enqueue(Event::tick(event_type), None).await;
        ticks_fired.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(event_type = %event_type, "tick enqueued");
    }
}
