use crate::inspector::{self, DEFAULT_GET_TIMEOUT};
use crate::operation_waiter::{wait_for_operation, WaitOptions};
use resizer_common::machine_type_resource;
use resizer_providers::{ComputeError, ComputeProvider};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeOptions {
    pub wait: WaitOptions,
    /// Request timeout for instance reads.
    pub get_timeout: Duration,
    /// Cap on a whole invocation (stop + change + start). `None` = only the
    /// per-wait timeouts apply.
    pub deadline: Option<Duration>,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            wait: WaitOptions::default(),
            get_timeout: DEFAULT_GET_TIMEOUT,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Already the requested type and running; nothing was issued.
    AlreadyRunning { machine_type: String },
    /// Already the requested type but stopped; only a start was issued.
    Started { machine_type: String },
    Changed { from: String, to: String },
}

impl std::fmt::Display for ResizeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResizeOutcome::AlreadyRunning { machine_type } => {
                write!(f, "already {}, running", machine_type)
            }
            ResizeOutcome::Started { machine_type } => {
                write!(f, "already {}, started", machine_type)
            }
            ResizeOutcome::Changed { from, to } => {
                write!(f, "changed from {} to {}, running", from, to)
            }
        }
    }
}

/// Stops the instance unless it is already TERMINATED.
pub async fn stop_instance_if_needed(
    provider: &dyn ComputeProvider,
    options: &ResizeOptions,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<(), ComputeError> {
    let instance =
        inspector::get_instance(provider, project, zone, instance_name, options.get_timeout)
            .await?;

    if instance.status.is_terminated() {
        info!("Instance {} is already in TERMINATED state.", instance.name);
        return Ok(());
    }

    info!("Stopping instance {}...", instance.name);
    let operation = provider.stop_instance(project, zone, instance_name).await?;
    wait_for_operation(provider, &operation, "Stopping instance", options.wait).await?;
    Ok(())
}

async fn start_instance(
    provider: &dyn ComputeProvider,
    options: &ResizeOptions,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<(), ComputeError> {
    let operation = provider.start_instance(project, zone, instance_name).await?;
    wait_for_operation(provider, &operation, "Starting instance", options.wait).await?;
    Ok(())
}

/// Brings the instance to `new_machine_type` and leaves it running.
///
/// The type can only change while the instance is TERMINATED, so a running
/// instance is stopped and re-read first. Any failure aborts the remaining
/// steps; nothing is rolled back (a failed type change leaves the instance
/// stopped with its old type).
pub async fn change_machine_type_if_needed(
    provider: &dyn ComputeProvider,
    options: &ResizeOptions,
    project: &str,
    zone: &str,
    instance_name: &str,
    new_machine_type: &str,
) -> Result<ResizeOutcome, ComputeError> {
    let mut instance =
        inspector::get_instance(provider, project, zone, instance_name, options.get_timeout)
            .await?;
    let current_machine_type = instance.machine_type_name().to_string();

    if current_machine_type == new_machine_type {
        if instance.status.is_running() {
            info!(
                "Instance {} is already of type {} and is running. Skipping update.",
                instance.name, new_machine_type
            );
            return Ok(ResizeOutcome::AlreadyRunning {
                machine_type: current_machine_type,
            });
        }
        info!(
            "Instance {} is already of type {} and stopped. Starting the server.",
            instance.name, new_machine_type
        );
        start_instance(provider, options, project, zone, instance_name).await?;
        return Ok(ResizeOutcome::Started {
            machine_type: current_machine_type,
        });
    }

    if !instance.status.is_terminated() {
        warn!(
            "Instance {} is {}. It must be stopped to change machine type.",
            instance.name, instance.status
        );
        stop_instance_if_needed(provider, options, project, zone, instance_name).await?;
        instance =
            inspector::get_instance(provider, project, zone, instance_name, options.get_timeout)
                .await?;
        if !instance.status.is_terminated() {
            return Err(ComputeError::NotStopped {
                instance: instance.name,
                status: instance.status.to_string(),
            });
        }
    }

    info!(
        "Changing machine type of {} to {}...",
        instance.name, new_machine_type
    );
    let operation = provider
        .set_machine_type(
            project,
            zone,
            instance_name,
            &machine_type_resource(project, zone, new_machine_type),
        )
        .await?;
    wait_for_operation(provider, &operation, "Changing machine type", options.wait).await?;

    info!(
        "Restarting instance {} after machine type update...",
        instance.name
    );
    start_instance(provider, options, project, zone, instance_name).await?;

    info!(
        "Instance {} machine type changed from {} to {}, and is successfully restarted.",
        instance.name, current_machine_type, new_machine_type
    );
    Ok(ResizeOutcome::Changed {
        from: current_machine_type,
        to: new_machine_type.to_string(),
    })
}
