// src/main.rs
// Process entry point: wires the Store, Chat Transport, Language Agent, and
// the four long-running engines (Scheduler, Coalescer, Matching Engine,
// Match Rationale Runner) together, then runs the bot dispatcher and the
// admin HTTP surface until shutdown.

use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use teloxide::prelude::*;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mitko_matchmaker::agent::openai::OpenAiAgent;
use mitko_matchmaker::agent::LanguageAgent;
use mitko_matchmaker::bot::{self, BotState};
use mitko_matchmaker::coalescer::chat_runner::ChatGenerationRunner;
use mitko_matchmaker::coalescer::Coalescer;
use mitko_matchmaker::config::CONFIG;
use mitko_matchmaker::domain::{Generation, GenerationUsage};
use mitko_matchmaker::error::AppResult;
use mitko_matchmaker::matching::MatchingEngine;
use mitko_matchmaker::metrics;
use mitko_matchmaker::rate_gates::RateGates;
use mitko_matchmaker::rationale::MatchRationaleRunner;
use mitko_matchmaker::scheduler::{GenerationRunner, Scheduler};
use mitko_matchmaker::store::Store;
use mitko_matchmaker::transport::telegram::TelegramTransport;
use mitko_matchmaker::transport::ChatTransport;

/// Fans a started generation out to the runner for its task kind, so the
/// Scheduler itself never depends on the Coalescer or the Rationale Runner.
struct TaskDispatcher {
    chat: Arc<ChatGenerationRunner>,
    rationale: Arc<MatchRationaleRunner>,
}

#[async_trait]
impl GenerationRunner for TaskDispatcher {
    async fn run_chat(&self, generation: &Generation) -> AppResult<GenerationUsage> {
        self.chat.run(generation).await
    }

    async fn run_match(&self, generation: &Generation) -> AppResult<GenerationUsage> {
        self.rationale.run(generation).await
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(CONFIG.logging.level.clone()))
        .init();
    metrics::init_metrics();

    match run().await {
        Ok(()) => {
            info!("shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("fatal startup error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let store = Store::connect(&CONFIG.database, &CONFIG.qdrant).await?;

    let gates = Arc::new(RateGates::new());
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(CONFIG.bot.token.clone(), gates.clone()));
    let agent: Arc<dyn LanguageAgent> = Arc::new(OpenAiAgent::new(CONFIG.agent.clone()));

    let scheduler = Arc::new(Scheduler::new(store.clone(), CONFIG.budget.clone()));
    let matching = Arc::new(MatchingEngine::new(store.clone(), CONFIG.matching.clone(), scheduler.clone()));

    let chat_runner = Arc::new(ChatGenerationRunner::new(store.clone(), transport.clone(), agent.clone()));
    let rationale_runner = Arc::new(MatchRationaleRunner::new(
        store.clone(),
        transport.clone(),
        agent.clone(),
        matching.nudge_handle(),
    ));
    let coalescer = Arc::new(Coalescer::new(store.clone(), scheduler.clone(), transport.clone()));

    let dispatcher = Arc::new(TaskDispatcher { chat: chat_runner, rationale: rationale_runner.clone() });

    let shutdown = Arc::new(Notify::new());

    let scheduler_task = {
        let scheduler = scheduler.clone();
        let dispatcher = dispatcher.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(dispatcher, shutdown).await })
    };

    let matching_task = {
        let matching = matching.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { matching.run(shutdown).await })
    };

    let bot_state = Arc::new(BotState {
        store: store.clone(),
        transport: transport.clone(),
        coalescer,
        rationale: rationale_runner,
        matching_nudge: matching.nudge_handle(),
    });
    let bot = Bot::new(CONFIG.bot.token.clone());
    let bot_task = tokio::spawn(bot::run(bot, bot_state));

    let admin_app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(CONFIG.admin.bind_address()).await?;
    info!("admin surface listening on {}", CONFIG.admin.bind_address());
    let admin_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, admin_app).await {
            error!("admin server error: {:#}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, finishing in-flight work");
    shutdown.notify_waiters();

    admin_task.abort();
    bot_task.abort();
    let _ = tokio::join!(scheduler_task, matching_task);

    Ok(())
}
