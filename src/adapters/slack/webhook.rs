//! Slack Events API intake.
//!
//! Translates event envelopes into stored [`ChatMessage`]s and, for
//! messages addressed to the assistant, MESSAGE events on the queue.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::{ChatMessage, Event};
use crate::domain::ports::MessageRepository;
use crate::services::EventQueue;

/// Message subtypes that still carry a human-authored message.
const ACCEPTED_SUBTYPES: [&str; 2] = ["file_share", "thread_broadcast"];

/// Top-level Events API payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    /// Endpoint ownership check sent when the URL is configured
    UrlVerification {
        /// Value to echo back
        challenge: String,
    },
    /// A subscribed event
    EventCallback {
        /// The event itself
        event: SlackEvent,
    },
    /// Any other envelope type
    #[serde(other)]
    Unsupported,
}

/// The inner `event` object of an `event_callback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackEvent {
    /// Slack event type, e.g. `message` or `app_mention`
    #[serde(rename = "type")]
    pub kind: String,
    /// Channel the event happened in
    pub channel: Option<String>,
    /// `im` for direct messages
    pub channel_type: Option<String>,
    /// Authoring user id
    pub user: Option<String>,
    /// Message text
    pub text: Option<String>,
    /// Message timestamp, unique per channel
    pub ts: Option<String>,
    /// Thread root, when the message is in a thread
    pub thread_ts: Option<String>,
    /// Message subtype such as `message_changed`
    pub subtype: Option<String>,
    /// Set when a bot authored the message
    pub bot_id: Option<String>,
}

impl SlackEvent {
    fn is_direct_message(&self) -> bool {
        self.channel_type.as_deref() == Some("im")
    }
}

/// What the webhook did with an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Echo this back for `url_verification`.
    Challenge(String),
    /// Message stored; `enqueued` when a reply was scheduled.
    Stored {
        /// A MESSAGE event was queued
        enqueued: bool,
    },
    /// Dropped without side effects, with the reason
    Ignored(&'static str),
}

/// Turns Slack events into stored messages and queued MESSAGE events.
pub struct SlackWebhook {
    messages: Arc<dyn MessageRepository>,
    queue: EventQueue,
    debounce: Option<Duration>,
}

impl SlackWebhook {
    /// Webhook that stores into `messages` and enqueues onto `queue` after `debounce`.
    pub fn new(messages: Arc<dyn MessageRepository>, queue: EventQueue, debounce: Option<Duration>) -> Self {
        Self {
            messages,
            queue,
            debounce,
        }
    }

    /// Process one envelope.
    pub async fn handle(&self, envelope: SlackEnvelope) -> DomainResult<WebhookOutcome> {
        match envelope {
            SlackEnvelope::UrlVerification { challenge } => Ok(WebhookOutcome::Challenge(challenge)),
            SlackEnvelope::EventCallback { event } => self.handle_event(event).await,
            SlackEnvelope::Unsupported => Ok(WebhookOutcome::Ignored("unsupported envelope")),
        }
    }

    async fn handle_event(&self, event: SlackEvent) -> DomainResult<WebhookOutcome> {
        let is_mention = event.kind == "app_mention";
        if event.kind != "message" && !is_mention {
            return Ok(WebhookOutcome::Ignored("unsupported event type"));
        }
        if event.bot_id.is_some() {
            return Ok(WebhookOutcome::Ignored("bot message"));
        }
        if let Some(subtype) = event.subtype.as_deref() {
            if !ACCEPTED_SUBTYPES.contains(&subtype) {
                return Ok(WebhookOutcome::Ignored("message subtype"));
            }
        }

        let is_dm = event.is_direct_message();
        let (Some(channel_id), Some(user_id), Some(ts)) = (event.channel, event.user, event.ts) else {
            return Ok(WebhookOutcome::Ignored("incomplete event"));
        };
        // Slack repeats the message's own ts as thread_ts on thread roots.
        let thread_ts = event.thread_ts.filter(|t| *t != ts);

        let message = ChatMessage {
            channel_id,
            ts,
            thread_ts,
            user_id,
            text: event.text.unwrap_or_default(),
            is_bot: false,
            created_at: Utc::now(),
        };
        self.messages.save(&message).await?;

        if !is_mention && !is_dm {
            debug!(channel_id = %message.channel_id, ts = %message.ts, "message stored");
            return Ok(WebhookOutcome::Stored { enqueued: false });
        }

        // Mentions are answered in their thread; DMs stay flat unless the
        // user already opened a thread.
        let reply_thread = if is_mention {
            Some(message.thread_root())
        } else {
            message.thread_ts.as_deref()
        };
        let queued = Event::message(&message.channel_id, reply_thread).with_field("message_ts", message.ts.as_str());
        info!(
            channel_id = %message.channel_id,
            identity_key = %queued.identity_key(),
            "message addressed to assistant; reply scheduled"
        );
        self.queue.enqueue(queued, self.debounce).await;
        Ok(WebhookOutcome::Stored { enqueued: true })
    }
}

async fn slack_events(State(webhook): State<Arc<SlackWebhook>>, Json(envelope): Json<SlackEnvelope>) -> Response {
    match webhook.handle(envelope).await {
        Ok(WebhookOutcome::Challenge(challenge)) => Json(json!({ "challenge": challenge })).into_response(),
        Ok(outcome) => {
            debug!(?outcome, "slack event handled");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to handle slack event");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Router exposing `POST /slack/events`.
pub fn webhook_router(webhook: Arc<SlackWebhook>) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .with_state(webhook)
}

/// Serve the webhook router until `shutdown` is cancelled.
pub async fn serve_webhook(listener: TcpListener, router: Router, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "slack webhook listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
