//! Configuration model, deserialized from YAML and `PARLOR_*` variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Parlor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Periodic tick intervals
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Event queue tuning
    #[serde(default)]
    pub queue: QueueConfig,

    /// Consumer loop and handler execution
    #[serde(default)]
    pub event_loop: EventLoopConfig,

    /// Chat platform connection
    #[serde(default)]
    pub slack: SlackConfig,

    /// LLM provider connection
    #[serde(default)]
    pub llm: LlmConfig,

    /// Assistant behaviour
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".parlor/parlor.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// `sqlx` connection URL for the configured path.
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation for file logs: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Tick intervals for the event scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Interval between autonomous-response checks
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Interval between memory-summary runs
    #[serde(default = "default_summary_interval_ms")]
    pub summary_interval_ms: u64,

    /// Interval between channel roster syncs
    #[serde(default = "default_channel_sync_interval_ms")]
    pub channel_sync_interval_ms: u64,
}

const fn default_check_interval_ms() -> u64 {
    60_000
}

const fn default_summary_interval_ms() -> u64 {
    1_800_000
}

const fn default_channel_sync_interval_ms() -> u64 {
    3_600_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            summary_interval_ms: default_summary_interval_ms(),
            channel_sync_interval_ms: default_channel_sync_interval_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Interval between AUTONOMOUS_CHECK ticks.
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Interval between SUMMARY ticks.
    pub fn summary_interval(&self) -> Duration {
        Duration::from_millis(self.summary_interval_ms)
    }

    /// Interval between CHANNEL_SYNC ticks.
    pub fn channel_sync_interval(&self) -> Duration {
        Duration::from_millis(self.channel_sync_interval_ms)
    }
}

/// Event queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Delay applied to inbound message events so a burst in one thread
    /// collapses into a single reply. Zero enqueues immediately.
    #[serde(default = "default_message_debounce_ms")]
    pub message_debounce_ms: u64,
}

const fn default_message_debounce_ms() -> u64 {
    1_500
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            message_debounce_ms: default_message_debounce_ms(),
        }
    }
}

impl QueueConfig {
    /// `None` when debouncing is disabled.
    pub fn message_debounce(&self) -> Option<Duration> {
        (self.message_debounce_ms > 0).then(|| Duration::from_millis(self.message_debounce_ms))
    }
}

/// Consumer loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventLoopConfig {
    /// Per-handler timeout; zero disables the timeout
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,

    /// How long `stop` waits for an in-flight dispatch before aborting it
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

const fn default_handler_timeout_ms() -> u64 {
    300_000
}

const fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: default_handler_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl EventLoopConfig {
    /// `None` when handlers may run without a limit.
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_ms > 0).then(|| Duration::from_millis(self.handler_timeout_ms))
    }

    /// How long `stop` waits for an in-flight dispatch.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Slack connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Bot token (`xoxb-…`); usually supplied via `PARLOR_SLACK__BOT_TOKEN`
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Web API base URL
    #[serde(default = "default_slack_api_base_url")]
    pub api_base_url: String,

    /// Address the webhook server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_slack_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: default_slack_api_base_url(),
            listen_addr: default_listen_addr(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// API key; usually supplied via `PARLOR_LLM__API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Messages API base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Maximum retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Assistant behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssistantConfig {
    /// Display name the assistant answers to
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Persona instructions prepended to every reply prompt
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Number of recent messages given to the model as context
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Minimum new messages in a channel before a summary is written
    #[serde(default = "default_summary_min_messages")]
    pub summary_min_messages: u32,

    /// Number of memories included in reply context
    #[serde(default = "default_memory_limit")]
    pub memory_limit: u32,

    /// Channel ids or names opted into autonomous replies on every sync
    #[serde(default)]
    pub autonomous_channels: Vec<String>,
}

fn default_assistant_name() -> String {
    "Parlor".to_string()
}

fn default_persona() -> String {
    "You are a friendly, concise assistant taking part in a team chat. \
     Answer in the tone of the conversation and keep replies short."
        .to_string()
}

const fn default_history_limit() -> u32 {
    30
}

const fn default_summary_min_messages() -> u32 {
    20
}

const fn default_memory_limit() -> u32 {
    3
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            persona: default_persona(),
            history_limit: default_history_limit(),
            summary_min_messages: default_summary_min_messages(),
            memory_limit: default_memory_limit(),
            autonomous_channels: Vec::new(),
        }
    }
}
