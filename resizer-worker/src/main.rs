use anyhow::Context;
use resizer_worker::provider_manager::ProviderManager;
use resizer_worker::settings::Settings;
use resizer_worker::{listener, routes, AppState};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    let provider = ProviderManager::get_provider(&settings)?;
    info!("Using compute provider '{}'", provider.name());

    let state = Arc::new(AppState {
        provider,
        options: settings.resize,
    });

    // Optional Redis trigger alongside the HTTP push endpoint.
    if let Some(redis_url) = settings.redis_url.clone() {
        let channel = settings.resize_channel.clone();
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = listener::run(&redis_url, &channel, state).await {
                error!("redis listener stopped: {:?}", e);
            }
        });
    }

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr))?;
    info!("Resizer listening on {}", settings.listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
