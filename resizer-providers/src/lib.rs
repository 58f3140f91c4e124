use async_trait::async_trait;
use resizer_common::Instance;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod error;

pub use error::ComputeError;

pub type Result<T, E = ComputeError> = std::result::Result<T, E>;

/// Client for a remote compute-management service.
///
/// Every action (`stop_instance`, `start_instance`, `set_machine_type`) only
/// submits the work and returns an [`OperationHandle`] immediately. Completion,
/// error and warnings are discovered later through [`ComputeProvider::get_operation`].
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Live read of the instance. Implementations must not cache.
    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        timeout: Duration,
    ) -> Result<Instance>;

    async fn stop_instance(&self, project: &str, zone: &str, instance: &str)
        -> Result<OperationHandle>;

    async fn start_instance(&self, project: &str, zone: &str, instance: &str)
        -> Result<OperationHandle>;

    /// `machine_type` is the fully qualified resource
    /// (`projects/{project}/zones/{zone}/machineTypes/{type}`).
    async fn set_machine_type(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        machine_type: &str,
    ) -> Result<OperationHandle>;

    /// Single poll of a previously submitted operation.
    async fn get_operation(&self, operation: &OperationHandle) -> Result<OperationState>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Stop,
    Start,
    SetMachineType,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Stop => "stop",
            OperationKind::Start => "start",
            OperationKind::SetMachineType => "setMachineType",
        }
    }
}

/// Handle returned by a submitted action. Used once, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub name: String,
    pub project: String,
    pub zone: String,
    pub kind: OperationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationWarning {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    pub code: String,
    pub message: String,
    /// Set when the service attached its own HTTP error to the operation.
    pub http_status: Option<u16>,
}

/// What one poll observed. The final (`done`) state is the operation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationState {
    pub name: String,
    pub done: bool,
    pub error: Option<OperationFailure>,
    pub warnings: Vec<OperationWarning>,
    pub target_link: Option<String>,
}

impl OperationState {
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            done: false,
            error: None,
            warnings: vec![],
            target_link: None,
        }
    }
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "gce")]
pub mod gce;
