//! Event model for the coordination core.
//!
//! An [`Event`] is one unit of work fed to the dispatcher. Events are
//! immutable once built; their identity key is derived on demand from the
//! event type and a couple of payload fields, and is what the queue uses to
//! supersede stale work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Payload attached to an event. Only `channel_id` and `thread_ts` are read
/// by the core; everything else belongs to the handlers.
pub type Payload = Map<String, Value>;

/// Payload field holding the channel of a message event.
pub const CHANNEL_ID: &str = "channel_id";
/// Payload field holding the thread timestamp of a message event.
pub const THREAD_TS: &str = "thread_ts";

/// Scope used for the identity key of workspace-wide tick events.
const WORKSPACE_SCOPE: &str = "workspace";

/// Unique identifier for an event instance.
///
/// Two events with the same identity key are still distinct instances; the
/// queue compares `EventId`s to decide whether a FIFO entry is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An inbound chat message that may need a reply.
    Message,
    /// Periodic trigger to roll channel history into memories.
    Summary,
    /// Periodic trigger to decide whether to speak up unprompted.
    AutonomousCheck,
    /// Periodic trigger to refresh the channel roster.
    ChannelSync,
}

impl EventType {
    /// The three periodic tick types, in the order the scheduler fires them.
    pub const TICKS: [Self; 3] = [Self::AutonomousCheck, Self::Summary, Self::ChannelSync];

    /// Lowercase name used in identity keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Summary => "summary",
            Self::AutonomousCheck => "autonomous_check",
            Self::ChannelSync => "channel_sync",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    event_type: EventType,
    payload: Payload,
    created_at: DateTime<Utc>,
}

impl Event {
    /// Build an event of the given type, stamped with the current time.
    pub fn new(event_type: EventType, payload: Payload) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Build a message event for a channel and optional thread.
    pub fn message(channel_id: impl Into<String>, thread_ts: Option<&str>) -> Self {
        let mut payload = Payload::new();
        payload.insert(CHANNEL_ID.to_string(), Value::String(channel_id.into()));
        payload.insert(
            THREAD_TS.to_string(),
            thread_ts.map_or(Value::Null, |ts| Value::String(ts.to_string())),
        );
        Self::new(EventType::Message, payload)
    }

    /// Build a tick event with an empty payload.
    pub fn tick(event_type: EventType) -> Self {
        Self::new(event_type, Payload::new())
    }

    /// Attach an extra handler-private payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Unique id of this event.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Type used for dispatch.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Free-form payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// When the event was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Read a payload field as a string. Non-string scalars are rendered,
    /// `null` and missing fields yield `None`.
    pub fn field_str(&self, key: &str) -> Option<String> {
        match self.payload.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// `channel_id` payload field, if present.
    pub fn channel_id(&self) -> Option<String> {
        self.field_str(CHANNEL_ID)
    }

    /// `thread_ts` payload field, if present and non-null.
    pub fn thread_ts(&self) -> Option<String> {
        self.field_str(THREAD_TS)
    }

    /// Logical identity used for deduplication.
    ///
    /// Messages are scoped per channel and thread
    /// (`message:<channel_id>:<thread_ts-or-empty>`); every tick type has a
    /// single workspace-wide identity (`<type>:workspace`).
    pub fn identity_key(&self) -> String {
        match self.event_type {
            EventType::Message => format!(
                "{}:{}:{}",
                self.event_type,
                self.channel_id().unwrap_or_default(),
                self.thread_ts().unwrap_or_default()
            ),
            tick => format!("{tick}:{WORKSPACE_SCOPE}"),
        }
    }
}
