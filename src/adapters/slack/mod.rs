//! Slack adapter: Web API client and Events API webhook intake.

pub mod client;
pub mod webhook;

pub use client::{SlackApiError, SlackClient};
pub use webhook::{serve_webhook, webhook_router, SlackEnvelope, SlackEvent, SlackWebhook, WebhookOutcome};
