// Integration tests for the event entry point and its HTTP push transport.

mod common;

use axum_test::TestServer;
use common::{current, mock_with, options, payload, INSTANCE, PROJECT, ZONE};
use resizer_common::bus::{PubsubEvent, ValidationError};
use resizer_common::InstanceStatus;
use resizer_providers::mock::MockOutcome;
use resizer_providers::{ComputeError, ComputeProvider, OperationKind};
use resizer_worker::handler::{handle_event, handle_json, HandleOutcome};
use resizer_worker::resize::ResizeOutcome;
use resizer_worker::{routes, AppState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn push_body(raw: &str) -> String {
    let event = PubsubEvent::from_data(raw);
    json!({
        "message": {"data": event.data, "messageId": "1234", "message_id": "1234"},
        "subscription": "projects/p/subscriptions/vm-resize"
    })
    .to_string()
}

#[tokio::test(start_paused = true)]
async fn test_event_stops_changes_and_starts() {
    let mock = mock_with("e2-medium", InstanceStatus::Running);

    let outcome = handle_event(&*mock, &options(), &PubsubEvent::from_data(&payload("e2-small")))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        HandleOutcome::Completed(ResizeOutcome::Changed {
            from: "e2-medium".to_string(),
            to: "e2-small".to_string()
        })
    );
    assert_eq!(
        mock.actions(),
        vec![
            OperationKind::Stop,
            OperationKind::SetMachineType,
            OperationKind::Start
        ]
    );
    assert_eq!(
        mock.timeline(),
        vec![
            "get",
            "stop",
            "wait:stop",
            "get",
            "setMachineType",
            "wait:setMachineType",
            "start",
            "wait:start",
        ]
    );
    assert_eq!(current(&mock).machine_type_name(), "e2-small");
}

#[tokio::test(start_paused = true)]
async fn test_event_with_matching_type_restarts_instance() {
    // The entry point always stops first, so a correctly sized running
    // instance is bounced rather than skipped.
    let mock = mock_with("e2-small", InstanceStatus::Running);

    let outcome = handle_event(&*mock, &options(), &PubsubEvent::from_data(&payload("e2-small")))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        HandleOutcome::Completed(ResizeOutcome::Started {
            machine_type: "e2-small".to_string()
        })
    );
    assert_eq!(mock.actions(), vec![OperationKind::Stop, OperationKind::Start]);
    assert!(current(&mock).status.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_missing_field_is_rejected_without_calls() {
    let mock = mock_with("e2-medium", InstanceStatus::Running);
    let raw = json!({"project_id": PROJECT, "zone": ZONE, "instance_name": INSTANCE}).to_string();

    let outcome = handle_event(&*mock, &options(), &PubsubEvent::from_data(&raw))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        HandleOutcome::Rejected(ValidationError::MissingField("new_machine_type".to_string()))
    );
    assert!(mock.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_message_is_rejected() {
    let mock = mock_with("e2-medium", InstanceStatus::Running);

    let outcome = handle_json(&*mock, &options(), "not json at all").await.unwrap();
    assert!(matches!(outcome, HandleOutcome::Rejected(ValidationError::Decode(_))));

    let outcome = handle_json(&*mock, &options(), &push_body("{broken"))
        .await
        .unwrap();
    assert!(matches!(outcome, HandleOutcome::Rejected(ValidationError::Decode(_))));

    assert!(mock.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_provider_errors_are_reraised() {
    let mock = mock_with("e2-medium", InstanceStatus::Running);
    mock.script(
        OperationKind::SetMachineType,
        MockOutcome::fail("QUOTA_EXCEEDED", "Quota 'CPUS' exceeded."),
    );

    let err = handle_event(&*mock, &options(), &PubsubEvent::from_data(&payload("e2-small")))
        .await
        .unwrap_err();

    assert_eq!(err.operation_code(), Some("QUOTA_EXCEEDED"));
    assert_eq!(
        mock.actions(),
        vec![OperationKind::Stop, OperationKind::SetMachineType]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_instance_is_reraised() {
    let mock = mock_with("e2-medium", InstanceStatus::Running);
    let raw = json!({
        "project_id": PROJECT,
        "zone": ZONE,
        "instance_name": "ghost",
        "new_machine_type": "e2-small"
    })
    .to_string();

    let err = handle_event(&*mock, &options(), &PubsubEvent::from_data(&raw))
        .await
        .unwrap_err();
    assert!(matches!(err, ComputeError::NotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_caps_the_whole_invocation() {
    let mock = mock_with("e2-medium", InstanceStatus::Running);
    mock.script(OperationKind::Start, MockOutcome::Hang);
    let mut opts = options();
    opts.deadline = Some(Duration::from_secs(120));

    let err = handle_event(&*mock, &opts, &PubsubEvent::from_data(&payload("e2-small")))
        .await
        .unwrap_err();

    match err {
        ComputeError::Timeout { label, timeout } => {
            assert_eq!(label, "Resize");
            assert_eq!(timeout, Duration::from_secs(120));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

fn server(mock: Arc<resizer_providers::mock::MockProvider>) -> TestServer {
    let provider: Arc<dyn ComputeProvider> = mock;
    let state = Arc::new(AppState {
        provider,
        options: options(),
    });
    TestServer::new(routes::router(state)).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_http_push_completes() {
    let mock = mock_with("e2-medium", InstanceStatus::Running);
    let server = server(mock.clone());

    let response = server
        .post("/pubsub/push")
        .text(push_body(&payload("e2-small")))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["outcome"], "changed from e2-medium to e2-small, running");
    assert_eq!(current(&mock).machine_type_name(), "e2-small");
}

#[tokio::test(start_paused = true)]
async fn test_http_rejected_payload_is_acknowledged() {
    let mock = mock_with("e2-medium", InstanceStatus::Running);
    let server = server(mock.clone());

    let raw = json!({"project_id": PROJECT, "zone": ZONE, "instance_name": INSTANCE}).to_string();
    let response = server.post("/").text(push_body(&raw)).await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "rejected");
    assert!(mock.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_http_failure_returns_500() {
    let mock = mock_with("e2-medium", InstanceStatus::Running);
    mock.set_unreachable(true);
    let server = server(mock.clone());

    let response = server.post("/").text(push_body(&payload("e2-small"))).await;

    assert_eq!(response.status_code(), 500);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "failed");
}

#[tokio::test]
async fn test_health() {
    let server = server(mock_with("e2-medium", InstanceStatus::Running));
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "ok");
}
