// Entry point of the social engine.
//
// **Architecture Overview:**
// - `core/` = the poll cycle and its domain types (no HTTP, no Google)
// - `infra/` = implementations of the core traits (Drive, Gemini, webhook)
// - `config.rs` = environment variables -> typed `Config`
//
// This file's job is to:
// 1. Load configuration (fatal on error)
// 2. Build the clients and wire them into the engine
// 3. Run poll cycles until Ctrl-C

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::captions::CaptionService;
use crate::core::engine::{Scheduler, SocialEngine};
use crate::infra::ai::GeminiClient;
use crate::infra::google::{DriveClient, ServiceAccountAuth};
use crate::infra::webhook::HttpWebhook;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env first so RUST_LOG from it is honoured.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting social engine...");

    let config = Config::from_env().context("Invalid configuration")?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // One HTTP client (and connection pool) shared by every integration.

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let auth = ServiceAccountAuth::new(config.service_account, http.clone());
    let drive = DriveClient::new(http.clone(), auth);

    let gemini = GeminiClient::new(http.clone(), config.gemini_api_key, config.gemini_model);
    let captions = CaptionService::new(gemini);

    let webhook = HttpWebhook::new(http, config.webhook_url);

    tracing::info!(
        sources = config.folders.sources.len(),
        prompts_folder = config.folders.prompt_folder.is_some(),
        interval_secs = config.poll_interval.as_secs(),
        "Configuration loaded"
    );

    let engine = SocialEngine::new(drive, captions, webhook, config.folders);

    // ========================================================================
    // POLL LOOP
    // ========================================================================

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Stopping...");
                signal_token.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let scheduler = Scheduler::new(config.poll_interval, shutdown);
    engine.run(&scheduler).await;

    Ok(())
}
