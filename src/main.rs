use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avfito_core::{BotConfig, BotService, PassthroughPolisher, Polisher};
use avfito_openai::{OpenAiConfig, OpenAiPolisher};
use avfito_telegram::{TelegramClient, TelegramConfig};

/// Pause after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Main entry point for the AV FITO bot
///
/// Loads configuration, wires the Telegram transport and the draft polisher into the core
/// service, then long-polls for updates until interrupted. Every update is handled on its
/// own task; handlers for the same user never overlap.
///
/// # Environment Variables
/// - `DOCTOR_CODES`: `code:name` access records (required)
/// - `TELEGRAM_BOT_TOKEN`: Bot API token (required)
/// - `OWNER_ID`: Telegram user id allowed to use `/stats`
/// - `OPENAI_API_KEY`: enables draft polishing; drafts pass through unchanged without it
/// - `AVFITO_RULES_PATH`: YAML decision rule table (required)
///
/// # Returns
/// * `Ok(())` - After a clean shutdown
/// * `Err(anyhow::Error)` - If configuration is missing or invalid
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("avfito=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_lookup(env_lookup)?;
    let telegram = Arc::new(TelegramClient::new(&TelegramConfig::from_lookup(env_lookup)?)?);

    let polisher: Box<dyn Polisher> = match OpenAiConfig::from_lookup(env_lookup) {
        Some(openai) => {
            tracing::info!(model = openai.model(), "++ Drafts polished via OpenAI");
            Box::new(OpenAiPolisher::new(openai)?)
        }
        None => {
            tracing::info!("++ No OpenAI key, drafts are sent as written");
            Box::new(PassthroughPolisher)
        }
    };

    let service = Arc::new(BotService::new(&config, telegram.clone(), polisher)?);
    tracing::info!("++ Starting AV FITO bot");

    tokio::select! {
        _ = poll_loop(telegram, service) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("++ Shutting down");
        }
    }

    Ok(())
}

async fn poll_loop(
    telegram: Arc<TelegramClient>,
    service: Arc<BotService<Arc<TelegramClient>, Box<dyn Polisher>>>,
) {
    let mut offset = None;
    loop {
        match telegram.next_events(&mut offset).await {
            Ok(events) => {
                for event in events {
                    let service = service.clone();
                    tokio::spawn(async move { service.dispatch(event).await });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "polling failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}
