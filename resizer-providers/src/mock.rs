use crate::{
    ComputeError, ComputeProvider, OperationFailure, OperationHandle, OperationKind,
    OperationState, OperationWarning, Result,
};
use anyhow::Context;
use async_trait::async_trait;
use resizer_common::{Instance, InstanceStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const SELF_LINK_PREFIX: &str = "https://www.googleapis.com/compute/v1/";

/// Outcome a mock operation reports once it is done.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    Succeed { warnings: Vec<OperationWarning> },
    Fail(OperationFailure),
    /// Reports success without touching the instance.
    Noop,
    /// Never reaches a terminal state.
    Hang,
}

impl MockOutcome {
    pub fn fail(code: &str, message: &str) -> Self {
        MockOutcome::Fail(OperationFailure {
            code: code.to_string(),
            message: message.to_string(),
            http_status: None,
        })
    }

    pub fn fail_with_status(code: &str, message: &str, http_status: u16) -> Self {
        MockOutcome::Fail(OperationFailure {
            code: code.to_string(),
            message: message.to_string(),
            http_status: Some(http_status),
        })
    }

    pub fn warn(code: &str, message: &str) -> Self {
        MockOutcome::Succeed {
            warnings: vec![OperationWarning {
                code: code.to_string(),
                message: message.to_string(),
            }],
        }
    }
}

/// One recorded call against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    GetInstance { instance: String },
    Stop { instance: String },
    Start { instance: String },
    SetMachineType { instance: String, machine_type: String },
    GetOperation { name: String, kind: OperationKind },
}

type InstanceKey = (String, String, String);

struct MockOperation {
    key: InstanceKey,
    kind: OperationKind,
    machine_type: Option<String>,
    outcome: MockOutcome,
    polls_left: u32,
    finished: bool,
}

#[derive(Default)]
struct MockState {
    instances: HashMap<InstanceKey, Instance>,
    operations: HashMap<String, MockOperation>,
    scripts: HashMap<OperationKind, MockOutcome>,
    pending_polls: u32,
    unreachable: bool,
    calls: Vec<MockCall>,
}

/// In-memory compute service. Records every call so tests can assert on the
/// exact sequence of actions.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

fn key(project: &str, zone: &str, instance: &str) -> InstanceKey {
    (project.to_string(), zone.to_string(), instance.to_string())
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from `project/zone/name=type:STATUS` entries separated by commas.
    pub fn from_spec(spec: &str) -> anyhow::Result<Self> {
        let provider = Self::new();
        for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (path, rest) = entry
                .split_once('=')
                .with_context(|| format!("mock instance '{}': expected path=type:STATUS", entry))?;
            let parts: Vec<&str> = path.split('/').collect();
            let &[project, zone, name] = parts.as_slice() else {
                anyhow::bail!("mock instance '{}': expected project/zone/name", entry);
            };
            let (machine_type, status) = rest.split_once(':').unwrap_or((rest, "RUNNING"));
            provider.add_instance(
                project,
                zone,
                name,
                machine_type,
                InstanceStatus::parse(status),
            );
        }
        Ok(provider)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // Poisoning only means a test panicked mid-call; the state is still readable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        machine_type: &str,
        status: InstanceStatus,
    ) {
        let instance = Instance {
            name: name.to_string(),
            status,
            machine_type: format!(
                "{}{}",
                SELF_LINK_PREFIX,
                resizer_common::machine_type_resource(project, zone, machine_type)
            ),
        };
        self.lock()
            .instances
            .insert(key(project, zone, name), instance);
    }

    /// Outcome for every later operation of `kind`.
    pub fn script(&self, kind: OperationKind, outcome: MockOutcome) {
        self.lock().scripts.insert(kind, outcome);
    }

    /// Number of polls an operation reports "not done" before finishing.
    pub fn set_pending_polls(&self, polls: u32) {
        self.lock().pending_polls = polls;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn instance(&self, project: &str, zone: &str, name: &str) -> Option<Instance> {
        self.lock().instances.get(&key(project, zone, name)).cloned()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Submitted actions only (no reads, no polls).
    pub fn actions(&self) -> Vec<OperationKind> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Stop { .. } => Some(OperationKind::Stop),
                MockCall::Start { .. } => Some(OperationKind::Start),
                MockCall::SetMachineType { .. } => Some(OperationKind::SetMachineType),
                _ => None,
            })
            .collect()
    }

    /// Calls rendered as short labels, with consecutive polls of the same
    /// operation folded into a single `wait:<kind>` entry.
    pub fn timeline(&self) -> Vec<String> {
        let calls = self.calls();
        let mut out: Vec<String> = Vec::new();
        let mut last_polled: Option<String> = None;
        for call in calls {
            let label = match &call {
                MockCall::GetInstance { .. } => "get".to_string(),
                MockCall::Stop { .. } => "stop".to_string(),
                MockCall::Start { .. } => "start".to_string(),
                MockCall::SetMachineType { .. } => "setMachineType".to_string(),
                MockCall::GetOperation { name, kind } => {
                    if last_polled.as_deref() == Some(name.as_str()) {
                        continue;
                    }
                    last_polled = Some(name.clone());
                    out.push(format!("wait:{}", kind.as_str()));
                    continue;
                }
            };
            last_polled = None;
            out.push(label);
        }
        out
    }

    fn check_reachable(state: &MockState) -> Result<()> {
        if state.unreachable {
            return Err(ComputeError::Transport(
                "mock compute service unreachable".to_string(),
            ));
        }
        Ok(())
    }

    fn submit(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        kind: OperationKind,
        machine_type: Option<&str>,
    ) -> Result<OperationHandle> {
        let mut state = self.lock();
        state.calls.push(match kind {
            OperationKind::Stop => MockCall::Stop {
                instance: instance.to_string(),
            },
            OperationKind::Start => MockCall::Start {
                instance: instance.to_string(),
            },
            OperationKind::SetMachineType => MockCall::SetMachineType {
                instance: instance.to_string(),
                machine_type: machine_type.unwrap_or_default().to_string(),
            },
        });
        Self::check_reachable(&state)?;

        let k = key(project, zone, instance);
        let current = state
            .instances
            .get(&k)
            .ok_or_else(|| ComputeError::NotFound {
                project: project.to_string(),
                zone: zone.to_string(),
                instance: instance.to_string(),
            })?;

        let mut outcome = state
            .scripts
            .get(&kind)
            .cloned()
            .unwrap_or(MockOutcome::Succeed { warnings: vec![] });
        if kind == OperationKind::SetMachineType && !current.status.is_terminated() {
            outcome = MockOutcome::fail_with_status(
                "INVALID_RESOURCE_STATE",
                &format!(
                    "The resource '{}' is not ready: instance must be stopped (status {})",
                    instance, current.status
                ),
                400,
            );
        }

        let name = format!("operation-{}", uuid::Uuid::new_v4());
        let polls_left = state.pending_polls;
        state.operations.insert(
            name.clone(),
            MockOperation {
                key: k,
                kind,
                machine_type: machine_type.map(|s| s.to_string()),
                outcome,
                polls_left,
                finished: false,
            },
        );
        tracing::debug!("[mock] submitted {} for {} as {}", kind.as_str(), instance, name);

        Ok(OperationHandle {
            name,
            project: project.to_string(),
            zone: zone.to_string(),
            kind,
        })
    }
}

#[async_trait]
impl ComputeProvider for MockProvider {
    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        _timeout: Duration,
    ) -> Result<Instance> {
        let mut state = self.lock();
        state.calls.push(MockCall::GetInstance {
            instance: instance.to_string(),
        });
        Self::check_reachable(&state)?;
        state
            .instances
            .get(&key(project, zone, instance))
            .cloned()
            .ok_or_else(|| ComputeError::NotFound {
                project: project.to_string(),
                zone: zone.to_string(),
                instance: instance.to_string(),
            })
    }

    async fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<OperationHandle> {
        self.submit(project, zone, instance, OperationKind::Stop, None)
    }

    async fn start_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<OperationHandle> {
        self.submit(project, zone, instance, OperationKind::Start, None)
    }

    async fn set_machine_type(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        machine_type: &str,
    ) -> Result<OperationHandle> {
        self.submit(
            project,
            zone,
            instance,
            OperationKind::SetMachineType,
            Some(machine_type),
        )
    }

    async fn get_operation(&self, operation: &OperationHandle) -> Result<OperationState> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.calls.push(MockCall::GetOperation {
            name: operation.name.clone(),
            kind: operation.kind,
        });
        Self::check_reachable(state)?;

        let op = state
            .operations
            .get_mut(&operation.name)
            .ok_or_else(|| anyhow::anyhow!("unknown mock operation {}", operation.name))?;

        if matches!(op.outcome, MockOutcome::Hang) {
            return Ok(OperationState::pending(&operation.name));
        }
        if op.polls_left > 0 {
            op.polls_left -= 1;
            return Ok(OperationState::pending(&operation.name));
        }

        let mut result = OperationState {
            name: operation.name.clone(),
            done: true,
            error: None,
            warnings: vec![],
            target_link: Some(format!(
                "{}projects/{}/zones/{}/instances/{}",
                SELF_LINK_PREFIX, op.key.0, op.key.1, op.key.2
            )),
        };
        match &op.outcome {
            MockOutcome::Succeed { warnings } => {
                result.warnings = warnings.clone();
                if !op.finished {
                    if let Some(inst) = state.instances.get_mut(&op.key) {
                        match op.kind {
                            OperationKind::Stop => inst.status = InstanceStatus::Terminated,
                            OperationKind::Start => inst.status = InstanceStatus::Running,
                            OperationKind::SetMachineType => {
                                if let Some(mt) = &op.machine_type {
                                    inst.machine_type = format!("{}{}", SELF_LINK_PREFIX, mt);
                                }
                            }
                        }
                    }
                }
            }
            MockOutcome::Fail(failure) => result.error = Some(failure.clone()),
            MockOutcome::Noop | MockOutcome::Hang => {}
        }
        op.finished = true;
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: &str = "proj";
    const Z: &str = "us-central1-f";

    async fn poll_until_done(mock: &MockProvider, op: &OperationHandle) -> OperationState {
        loop {
            let s = mock.get_operation(op).await.unwrap();
            if s.done {
                return s;
            }
        }
    }

    #[test]
    fn seeds_from_spec() {
        let mock =
            MockProvider::from_spec("proj/us-central1-f/vm-1=e2-medium:RUNNING, proj/us-central1-f/vm-2=e2-small")
                .unwrap();
        let vm1 = mock.instance(P, Z, "vm-1").unwrap();
        assert_eq!(vm1.machine_type_name(), "e2-medium");
        assert!(vm1.status.is_running());
        assert!(mock.instance(P, Z, "vm-2").unwrap().status.is_running());

        assert!(MockProvider::from_spec("vm-1=e2-small").is_err());
        assert!(MockProvider::from_spec("proj/zone/vm-1").is_err());
    }

    #[tokio::test]
    async fn stop_applies_on_completion() {
        let mock = MockProvider::new();
        mock.add_instance(P, Z, "vm-1", "e2-medium", InstanceStatus::Running);
        mock.set_pending_polls(2);

        let op = mock.stop_instance(P, Z, "vm-1").await.unwrap();
        assert!(!mock.get_operation(&op).await.unwrap().done);
        assert!(mock.instance(P, Z, "vm-1").unwrap().status.is_running());

        let done = poll_until_done(&mock, &op).await;
        assert!(done.error.is_none());
        assert!(mock.instance(P, Z, "vm-1").unwrap().status.is_terminated());
        assert_eq!(mock.timeline(), vec!["stop", "wait:stop"]);
    }

    #[tokio::test]
    async fn set_machine_type_on_running_instance_fails() {
        let mock = MockProvider::new();
        mock.add_instance(P, Z, "vm-1", "e2-medium", InstanceStatus::Running);
        let op = mock
            .set_machine_type(P, Z, "vm-1", "projects/proj/zones/us-central1-f/machineTypes/e2-small")
            .await
            .unwrap();
        let done = poll_until_done(&mock, &op).await;
        let err = done.error.unwrap();
        assert_eq!(err.code, "INVALID_RESOURCE_STATE");
        assert_eq!(err.http_status, Some(400));
        assert_eq!(mock.instance(P, Z, "vm-1").unwrap().machine_type_name(), "e2-medium");
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found() {
        let mock = MockProvider::new();
        let err = mock
            .get_instance(P, Z, "ghost", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::NotFound { .. }));
        let err = mock.start_instance(P, Z, "ghost").await.unwrap_err();
        assert!(matches!(err, ComputeError::NotFound { .. }));
    }
}
