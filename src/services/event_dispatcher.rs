//! Handler registry and fault-isolated dispatch.
//!
//! Handlers are registered per [`EventType`] and run sequentially in
//! registration order. A handler that returns an error, panics, or exceeds
//! the configured timeout is logged and skipped; the remaining handlers
//! still run and nothing propagates to the caller.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::RwLock;

use crate::domain::errors::DispatchError;
use crate::domain::models::{Event, EventType};

/// A unit of work invoked for events of one type.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// The type this handler declares it handles, consumed by
    /// [`EventDispatcher::register_handler`].
    fn event_type(&self) -> Option<EventType> {
        None
    }

    /// Process one event; errors are logged by the dispatcher.
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

type HandlerFn = dyn Fn(Event) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Closure-backed handler, see [`handler_fn`].
pub struct FnHandler {
    name: String,
    event_type: Option<EventType>,
    f: Box<HandlerFn>,
}

impl FnHandler {
    /// Declare the event type so the handler can go through
    /// [`EventDispatcher::register_handler`].
    pub fn for_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }
}

/// Wrap an async closure as an [`EventHandler`].
///
/// The closure receives an owned clone of the event.
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> FnHandler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler {
        name: name.into(),
        event_type: None,
        f: Box::new(move |event| f(event).boxed()),
    }
}

#[async_trait]
impl EventHandler for FnHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn event_type(&self) -> Option<EventType> {
        self.event_type
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}

/// Summary of one dispatch. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers started.
    pub invoked: usize,
    /// Handlers that errored, panicked or timed out.
    pub failed: usize,
}

/// Maps event types to ordered handler lists.
pub struct EventDispatcher {
    handlers: RwLock<HashMap<EventType, Vec<Arc<dyn EventHandler>>>>,
    handler_timeout: Option<Duration>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Empty dispatcher with no timeout.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            handler_timeout: None,
        }
    }

    /// Bound each handler invocation; `None` disables the bound.
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Append `handler` to the list for `event_type`.
    pub async fn register(&self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        tracing::debug!(
            event_type = %event_type,
            handler = handler.name(),
            "registering event handler"
        );
        self.handlers
            .write()
            .await
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Register a handler under the type it declares.
    pub async fn register_handler(
        &self,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), DispatchError> {
        let Some(event_type) = handler.event_type() else {
            return Err(DispatchError::MissingEventType(handler.name().to_string()));
        };
        self.register(event_type, handler).await;
        Ok(())
    }

    /// Number of handlers registered for `event_type`.
    pub async fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers
            .read()
            .await
            .get(&event_type)
            .map_or(0, Vec::len)
    }

    /// Types with at least one handler, in a stable order.
    pub async fn registered_types(&self) -> Vec<EventType> {
        let handlers = self.handlers.read().await;
        let mut types: Vec<EventType> = handlers
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(t, _)| *t)
            .collect();
        types.sort_by_key(EventType::as_str);
        types
    }

    /// Run every handler registered for the event's type, in order.
    pub async fn dispatch(&self, event: &Event) -> DispatchOutcome {
        // Snapshot so handlers can register further handlers without
        // deadlocking, and registration never waits on a slow handler.
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .read()
            .await
            .get(&event.event_type())
            .cloned()
            .unwrap_or_default();

        let mut outcome = DispatchOutcome::default();
        if handlers.is_empty() {
            tracing::warn!(
                event_type = %event.event_type(),
                event_id = %event.id(),
                "no handler registered for event type"
            );
            return outcome;
        }

        for handler in handlers {
            outcome.invoked += 1;
            if !self.invoke(handler.as_ref(), event).await {
                outcome.failed += 1;
            }
        }
        outcome
    }

    /// Run one handler in isolation. Returns whether it succeeded.
    async fn invoke(&self, handler: &dyn EventHandler, event: &Event) -> bool {
        let guarded = AssertUnwindSafe(handler.handle(event)).catch_unwind();

        let result = match self.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        handler = handler.name(),
                        event_type = %event.event_type(),
                        event_id = %event.id(),
                        identity_key = %event.identity_key(),
                        timeout_ms = limit.as_millis() as u64,
                        "event handler timed out"
                    );
                    return false;
                }
            },
            None => guarded.await,
        };

        match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(
                    handler = handler.name(),
                    event_type = %event.event_type(),
                    event_id = %event.id(),
                    identity_key = %event.identity_key(),
                    error = ?e,
                    "event handler failed"
                );
                false
            }
            Err(panic) => {
                tracing::error!(
                    handler = handler.name(),
                    event_type = %event.event_type(),
                    event_id = %event.id(),
                    identity_key = %event.identity_key(),
                    panic = panic_message(panic.as_ref()),
                    "event handler panicked"
                );
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
