use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{error, info};

use crate::handler;
use crate::AppState;

/// Consumes resize events from a Redis channel, one at a time.
pub async fn run(redis_url: &str, channel: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let client = redis::Client::open(redis_url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    info!("Listening on Redis channel '{}'...", channel);

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                error!("unreadable message on '{}': {}", channel, e);
                continue;
            }
        };

        // Failures are already logged by the handler; no redelivery on pub/sub.
        let _ = handler::handle_json(state.provider.as_ref(), &state.options, &payload).await;
    }

    Ok(())
}
