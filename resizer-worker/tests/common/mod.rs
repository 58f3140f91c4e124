// Shared fixtures for resizer-worker integration tests.
// Everything runs against the in-memory MockProvider; no cloud calls.
#![allow(dead_code)]

use resizer_common::InstanceStatus;
use resizer_providers::mock::MockProvider;
use resizer_worker::operation_waiter::WaitOptions;
use resizer_worker::resize::ResizeOptions;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const PROJECT: &str = "682348490962";
pub const ZONE: &str = "us-central1-f";
pub const INSTANCE: &str = "tf-resize-vm";

pub fn mock_with(machine_type: &str, status: InstanceStatus) -> Arc<MockProvider> {
    let mock = Arc::new(MockProvider::new());
    mock.add_instance(PROJECT, ZONE, INSTANCE, machine_type, status);
    mock
}

pub fn options() -> ResizeOptions {
    ResizeOptions {
        wait: WaitOptions {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
        },
        get_timeout: Duration::from_secs(300),
        deadline: None,
    }
}

pub fn payload(new_machine_type: &str) -> String {
    json!({
        "project_id": PROJECT,
        "zone": ZONE,
        "instance_name": INSTANCE,
        "new_machine_type": new_machine_type,
    })
    .to_string()
}

pub fn current(mock: &MockProvider) -> resizer_common::Instance {
    mock.instance(PROJECT, ZONE, INSTANCE)
        .expect("test instance exists")
}
