use crate::resize::{self, ResizeOptions, ResizeOutcome};
use resizer_common::bus::{PubsubEvent, ResizeRequest, ValidationError};
use resizer_providers::{ComputeError, ComputeProvider};
use tracing::{error, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Completed(ResizeOutcome),
    /// Bad payload. Logged and absorbed: redelivering it cannot succeed.
    Rejected(ValidationError),
}

/// Raw message body (push envelope or bare event JSON).
pub async fn handle_json(
    provider: &dyn ComputeProvider,
    options: &ResizeOptions,
    raw: &str,
) -> Result<HandleOutcome, ComputeError> {
    match PubsubEvent::from_json(raw) {
        Ok(event) => handle_event(provider, options, &event).await,
        Err(e) => Ok(reject(e)),
    }
}

/// Entry point for one resize event.
///
/// Validation failures are absorbed (`Ok(Rejected)`); every other error is
/// logged and returned so the trigger can mark the delivery failed.
pub async fn handle_event(
    provider: &dyn ComputeProvider,
    options: &ResizeOptions,
    event: &PubsubEvent,
) -> Result<HandleOutcome, ComputeError> {
    let span = tracing::info_span!(
        "resize",
        invocation_id = %Uuid::new_v4(),
        message_id = event.message_id.as_deref().unwrap_or("-"),
    );

    async move {
        let request = match event.resize_request() {
            Ok(r) => r,
            Err(e) => return Ok(reject(e)),
        };

        let result = match options.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, run(provider, options, &request)).await {
                    Ok(r) => r,
                    Err(_) => Err(ComputeError::Timeout {
                        label: "Resize".to_string(),
                        timeout: deadline,
                    }),
                }
            }
            None => run(provider, options, &request).await,
        };

        match result {
            Ok(outcome) => Ok(HandleOutcome::Completed(outcome)),
            Err(e) => {
                error!("Unexpected error: {}", e);
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

async fn run(
    provider: &dyn ComputeProvider,
    options: &ResizeOptions,
    request: &ResizeRequest,
) -> Result<ResizeOutcome, ComputeError> {
    resize::stop_instance_if_needed(
        provider,
        options,
        &request.project_id,
        &request.zone,
        &request.instance_name,
    )
    .await?;
    resize::change_machine_type_if_needed(
        provider,
        options,
        &request.project_id,
        &request.zone,
        &request.instance_name,
        &request.new_machine_type,
    )
    .await
}

fn reject(e: ValidationError) -> HandleOutcome {
    match &e {
        ValidationError::MissingField(field) => {
            error!("Missing required payload field: '{}'", field)
        }
        ValidationError::Decode(detail) => {
            error!("Invalid JSON in Pub/Sub message. ({})", detail)
        }
    }
    HandleOutcome::Rejected(e)
}
