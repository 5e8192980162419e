//! Implementation of the `parlor run` command.
//!
//! Wires storage, the Slack and Claude clients, the four built-in handlers
//! and the event core together, then serves the webhook until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::slack::{serve_webhook, webhook_router, SlackClient, SlackWebhook};
use crate::adapters::sqlite::{
    initialize_database, SqliteChannelRepository, SqliteMemoryRepository, SqliteMessageRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{
    ChannelRepository, ChatClient, LlmClient, MemoryRepository, MessageRepository,
};
use crate::infrastructure::claude::{ClaudeClient, ClaudeClientConfig};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::LoggerImpl;
use crate::services::{
    AutonomousCheckHandler, ChannelSyncHandler, EventDispatcher, EventHandler, EventLoop,
    EventQueue, EventScheduler, MessageHandler, ResponseService, SummaryHandler, SummaryService,
};

/// Run the assistant until Ctrl-C.
pub async fn execute(config: Config, listen: Option<String>) -> Result<()> {
    let _logger = LoggerImpl::init(&config.logging).context("Failed to initialize logging")?;
    ConfigLoader::require_secrets(&config)?;

    let pool = initialize_database(&config.database)
        .await
        .context("Failed to initialize database")?;
    let messages: Arc<dyn MessageRepository> = Arc::new(SqliteMessageRepository::new(pool.clone()));
    let channels: Arc<dyn ChannelRepository> = Arc::new(SqliteChannelRepository::new(pool.clone()));
    let memories: Arc<dyn MemoryRepository> = Arc::new(SqliteMemoryRepository::new(pool.clone()));

    let chat: Arc<dyn ChatClient> = Arc::new(SlackClient::from_config(&config.slack)?);
    let llm: Arc<dyn LlmClient> = Arc::new(ClaudeClient::new(
        ClaudeClientConfig::from_llm_config(&config.llm)?,
    )?);
    let responses = Arc::new(ResponseService::new(llm.clone(), config.assistant.clone()));
    let summaries = Arc::new(SummaryService::new(llm, config.assistant.clone()));

    let dispatcher = Arc::new(
        EventDispatcher::new().with_handler_timeout(config.event_loop.handler_timeout()),
    );
    let handlers: Vec<Arc<dyn EventHandler>> = vec![
        Arc::new(MessageHandler::new(
            messages.clone(),
            memories.clone(),
            chat.clone(),
            responses.clone(),
            config.assistant.clone(),
        )),
        Arc::new(AutonomousCheckHandler::new(
            channels.clone(),
            messages.clone(),
            memories.clone(),
            chat.clone(),
            responses,
            config.assistant.clone(),
        )),
        Arc::new(SummaryHandler::new(
            channels.clone(),
            messages.clone(),
            memories,
            summaries,
            config.assistant.summary_min_messages,
        )),
        Arc::new(
            ChannelSyncHandler::new(chat, channels)
                .with_autonomous_channels(config.assistant.autonomous_channels.clone()),
        ),
    ];
    for handler in handlers {
        dispatcher.register_handler(handler).await?;
    }

    let queue = EventQueue::new();
    let event_loop = EventLoop::new(queue.clone(), dispatcher, &config.event_loop);
    let scheduler = EventScheduler::new(queue.clone(), config.scheduler.clone());
    let webhook = Arc::new(SlackWebhook::new(
        messages,
        queue,
        config.queue.message_debounce(),
    ));

    let addr = listen.unwrap_or_else(|| config.slack.listen_addr.clone());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind webhook listener on {addr}"))?;

    event_loop.start();
    scheduler.start().await;

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(serve_webhook(
        listener,
        webhook_router(webhook),
        shutdown.clone(),
    ));

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("shutdown requested");
            None
        }
        result = &mut server => Some(result),
    };

    scheduler.stop().await;
    event_loop.stop().await;
    shutdown.cancel();

    let served = match finished {
        Some(result) => result,
        None => server.await,
    };
    served.context("webhook server task failed")??;

    pool.close().await;
    info!(
        events_processed = event_loop.events_processed(),
        ticks_fired = scheduler.ticks_fired(),
        "parlor stopped"
    );
    Ok(())
}
