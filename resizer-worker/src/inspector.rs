use resizer_common::Instance;
use resizer_providers::{ComputeError, ComputeProvider};
use std::time::Duration;

pub const DEFAULT_GET_TIMEOUT: Duration = Duration::from_secs(300);

/// Fresh snapshot of an instance. Stop/skip decisions depend on this being
/// live, so nothing here is cached.
pub async fn get_instance(
    provider: &dyn ComputeProvider,
    project: &str,
    zone: &str,
    instance: &str,
    timeout: Duration,
) -> Result<Instance, ComputeError> {
    let snapshot = provider.get_instance(project, zone, instance, timeout).await?;
    tracing::debug!(
        "instance {} in {}/{}: status={} machine_type={}",
        snapshot.name,
        project,
        zone,
        snapshot.status,
        snapshot.machine_type_name()
    );
    Ok(snapshot)
}
