use agentceo::api::{AppState, router};
use agentceo::config::{AppConfig, GenerationBackend};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Console logging, plus a daily file when a log directory is set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (file_layer, _guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "agentceo.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    let port = config.port;
    eprintln!("AgentCEO v{}", env!("CARGO_PKG_VERSION"));
    match &config.generation {
        GenerationBackend::Anthropic { model, .. } => eprintln!("   Model: {}", model),
        GenerationBackend::Mock => eprintln!("   Model: mock (no API key)"),
    }
    eprintln!(
        "   Gmail: {}",
        if config.google.is_some() {
            "configured"
        } else {
            "not configured"
        }
    );
    eprintln!("   API: http://0.0.0.0:{}/api", port);
    eprintln!("   Draft WS: ws://0.0.0.0:{}/ws\n", port);

    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port, "AgentCEO server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
