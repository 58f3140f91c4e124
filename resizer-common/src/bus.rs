use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// -----------------------------------------------------------------------------
// Channels
// -----------------------------------------------------------------------------

pub const CHANNEL_RESIZE_REQUESTS: &str = "vm_resize_requests";

// -----------------------------------------------------------------------------
// Inbound events
// -----------------------------------------------------------------------------

/// Background event as delivered to a message-triggered function: the message
/// body travels base64-encoded in `data`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PubsubEvent {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
    #[serde(default, rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Push-subscription envelope (`{"message": {...}, "subscription": "..."}`).
#[derive(Debug, Deserialize, Clone)]
pub struct PushEnvelope {
    pub message: PubsubEvent,
    #[serde(default)]
    pub subscription: Option<String>,
}

impl PubsubEvent {
    pub fn from_data(body: &str) -> Self {
        Self {
            data: Some(STANDARD.encode(body)),
            ..Default::default()
        }
    }

    /// Accept either a push envelope or a bare background event.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        if value.get("message").map_or(false, |m| m.is_object()) {
            let envelope: PushEnvelope = serde_json::from_value(value)
                .map_err(|e| ValidationError::Decode(e.to_string()))?;
            return Ok(envelope.message);
        }
        serde_json::from_value(value).map_err(|e| ValidationError::Decode(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ValidationError::Decode(e.to_string()))?;
        Self::from_value(value)
    }

    /// Decode `data` and extract the resize parameters.
    pub fn resize_request(&self) -> Result<ResizeRequest, ValidationError> {
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| ValidationError::MissingField("data".to_string()))?;
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| ValidationError::Decode(format!("invalid base64: {}", e)))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| ValidationError::Decode(format!("invalid utf-8: {}", e)))?;
        ResizeRequest::from_json(&text)
    }
}

// -----------------------------------------------------------------------------
// Resize request
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ResizeRequest {
    pub project_id: String,
    pub zone: String,
    pub instance_name: String,
    pub new_machine_type: String,
}

impl ResizeRequest {
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        let payload: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ValidationError::Decode(e.to_string()))?;
        let obj = payload
            .as_object()
            .ok_or_else(|| ValidationError::Decode("payload is not a JSON object".to_string()))?;

        let field = |name: &str| -> Result<String, ValidationError> {
            match obj.get(name) {
                None => Err(ValidationError::MissingField(name.to_string())),
                Some(serde_json::Value::String(s)) => Ok(s.clone()),
                Some(_) => Err(ValidationError::Decode(format!(
                    "field '{}' must be a string",
                    name
                ))),
            }
        };

        Ok(Self {
            project_id: field("project_id")?,
            zone: field("zone")?,
            instance_name: field("instance_name")?,
            new_machine_type: field("new_machine_type")?,
        })
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required payload field: '{0}'")]
    MissingField(String),
    #[error("invalid message payload: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> String {
        json!({
            "project_id": "682348490962",
            "zone": "us-central1-f",
            "instance_name": "vm-1",
            "new_machine_type": "e2-small"
        })
        .to_string()
    }

    #[test]
    fn decodes_background_event() {
        let event = PubsubEvent::from_data(&body());
        let req = event.resize_request().unwrap();
        assert_eq!(req.project_id, "682348490962");
        assert_eq!(req.zone, "us-central1-f");
        assert_eq!(req.instance_name, "vm-1");
        assert_eq!(req.new_machine_type, "e2-small");
    }

    #[test]
    fn accepts_push_envelope_and_bare_event() {
        let data = STANDARD.encode(body());
        let push = json!({
            "message": {"data": data, "messageId": "42"},
            "subscription": "projects/p/subscriptions/resize"
        });
        let event = PubsubEvent::from_value(push).unwrap();
        assert_eq!(event.message_id.as_deref(), Some("42"));
        assert!(event.resize_request().is_ok());

        let bare = json!({ "data": data });
        assert!(PubsubEvent::from_value(bare).unwrap().resize_request().is_ok());
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let raw = json!({"project_id": "p", "zone": "z", "instance_name": "i"}).to_string();
        let err = PubsubEvent::from_data(&raw).resize_request().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("new_machine_type".to_string()));

        let err = PubsubEvent::default().resize_request().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("data".to_string()));
    }

    #[test]
    fn malformed_payloads_are_decode_errors() {
        let not_json = PubsubEvent::from_data("{not json");
        assert!(matches!(not_json.resize_request(), Err(ValidationError::Decode(_))));

        let not_b64 = PubsubEvent {
            data: Some("%%%".to_string()),
            ..Default::default()
        };
        assert!(matches!(not_b64.resize_request(), Err(ValidationError::Decode(_))));

        let array = PubsubEvent::from_data("[1,2]");
        assert!(matches!(array.resize_request(), Err(ValidationError::Decode(_))));

        let wrong_type = PubsubEvent::from_data(
            &json!({"project_id": 1, "zone": "z", "instance_name": "i", "new_machine_type": "t"})
                .to_string(),
        );
        assert!(matches!(wrong_type.resize_request(), Err(ValidationError::Decode(_))));
    }
}
