use serde::{Deserialize, Serialize};

pub mod bus;

// --- Enums ---

/// Power status of a compute instance as far as resizing is concerned.
///
/// The compute service knows more states (PROVISIONING, STAGING, STOPPING,
/// SUSPENDED, ...). Only RUNNING and TERMINATED drive decisions; everything
/// else is kept verbatim in `Other` and treated as "not running".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    Running,
    Terminated,
    Other(String),
}

impl InstanceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => InstanceStatus::Running,
            "TERMINATED" => InstanceStatus::Terminated,
            other => InstanceStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceStatus::Running => "RUNNING",
            InstanceStatus::Terminated => "TERMINATED",
            InstanceStatus::Other(s) => s.as_str(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, InstanceStatus::Running)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, InstanceStatus::Terminated)
    }
}

impl From<String> for InstanceStatus {
    fn from(raw: String) -> Self {
        InstanceStatus::parse(&raw)
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Entities ---

/// Snapshot of a remote instance. Never cached: every read is a fresh fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub status: InstanceStatus,
    /// Full resource path or URL, e.g.
    /// `https://www.googleapis.com/compute/v1/projects/p/zones/z/machineTypes/e2-medium`.
    pub machine_type: String,
}

impl Instance {
    /// Machine type name, i.e. the last segment of the stored resource path.
    pub fn machine_type_name(&self) -> &str {
        machine_type_name(&self.machine_type)
    }
}

pub fn machine_type_name(resource: &str) -> &str {
    resource
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(resource)
}

/// Fully qualified machine type identifier accepted by set-machine-type.
pub fn machine_type_resource(project: &str, zone: &str, machine_type: &str) -> String {
    format!(
        "projects/{}/zones/{}/machineTypes/{}",
        project, zone, machine_type
    )
}
