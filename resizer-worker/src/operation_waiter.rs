use resizer_providers::{ComputeError, ComputeProvider, OperationHandle, OperationState};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_OPERATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Waits for a long-running operation to reach a terminal state.
///
/// - done without error: warnings (if any) are logged, then the final state is returned;
/// - done with an error code: the error is logged and returned, as
///   [`ComputeError::Operation`] when the service carried its own HTTP error,
///   otherwise as [`ComputeError::Runtime`];
/// - not done within `options.timeout`: [`ComputeError::Timeout`].
///
/// One wait per call, no retries.
pub async fn wait_for_operation(
    provider: &dyn ComputeProvider,
    operation: &OperationHandle,
    label: &str,
    options: WaitOptions,
) -> Result<OperationState, ComputeError> {
    let state = match tokio::time::timeout(
        options.timeout,
        poll_until_done(provider, operation, options.poll_interval),
    )
    .await
    {
        Ok(polled) => polled?,
        Err(_) => {
            return Err(ComputeError::Timeout {
                label: label.to_string(),
                timeout: options.timeout,
            })
        }
    };

    if let Some(failure) = &state.error {
        error!("{}: [Code: {}]: {}", label, failure.code, failure.message);
        return Err(match failure.http_status {
            Some(http_status) => ComputeError::Operation {
                label: label.to_string(),
                code: failure.code.clone(),
                message: failure.message.clone(),
                http_status,
            },
            None => ComputeError::Runtime {
                label: label.to_string(),
                code: failure.code.clone(),
                message: failure.message.clone(),
            },
        });
    }

    if !state.warnings.is_empty() {
        warn!("{} produced warnings:", label);
        for w in &state.warnings {
            warn!(" - {}: {}", w.code, w.message);
        }
    }

    info!("{} completed successfully", label);
    Ok(state)
}

async fn poll_until_done(
    provider: &dyn ComputeProvider,
    operation: &OperationHandle,
    poll_interval: Duration,
) -> Result<OperationState, ComputeError> {
    loop {
        let state = provider.get_operation(operation).await?;
        if state.done {
            return Ok(state);
        }
        sleep(poll_interval).await;
    }
}
