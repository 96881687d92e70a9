use std::sync::Arc;

use plan_intake::channels::{Channel, ChatTransport, CliChannel, TelegramChannel};
use plan_intake::config::AppConfig;
use plan_intake::dialogue::Controller;
use plan_intake::dispatch::Dispatcher;
use plan_intake::generation::{GeminiClient, TextGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("📋 Plan Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.generation.model);
    eprintln!("   Endpoint: {}", config.generation.endpoint());

    // ── Pre-flight: refuse to start without a reachable generator ─────
    let client = match GeminiClient::connect(config.generation.clone()).await {
        Ok(client) => {
            eprintln!("   Generation API: reachable");
            client
        }
        Err(e) => {
            eprintln!("Error: generation API is unreachable: {e}");
            std::process::exit(1);
        }
    };
    let generator: Arc<dyn TextGenerator> = Arc::new(client);

    // ── Channel ──────────────────────────────────────────────────────────
    match config.telegram_token {
        Some(token) => {
            eprintln!("   Channel: telegram\n");
            serve(Arc::new(TelegramChannel::new(token)), generator).await
        }
        None => {
            eprintln!("   Channel: cli (set TELEGRAM_BOT_TOKEN for Telegram)");
            eprintln!("   Type /start to begin, /cancel to abort.\n");
            serve(Arc::new(CliChannel::new()), generator).await
        }
    }
}

async fn serve<C>(channel: Arc<C>, generator: Arc<dyn TextGenerator>) -> anyhow::Result<()>
where
    C: Channel + 'static,
{
    if let Err(e) = channel.health_check().await {
        tracing::warn!(channel = channel.name(), error = %e, "Channel health check failed");
    }

    let stream = channel.start().await?;
    let transport: Arc<dyn ChatTransport> = channel;
    let controller = Arc::new(Controller::new(transport, generator));

    Dispatcher::new(controller).run(stream).await;
    Ok(())
}
