use crate::{
    ComputeError, ComputeProvider, OperationFailure, OperationHandle, OperationKind,
    OperationState, OperationWarning, Result,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use resizer_common::{Instance, InstanceStatus};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Where bearer tokens come from.
pub enum TokenSource {
    Static(String),
    /// Service-account token from the metadata server, refreshed before expiry.
    Metadata {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

pub struct CachedToken {
    token: String,
    refresh_at: Instant,
}

impl TokenSource {
    pub fn metadata(url: impl Into<String>) -> Self {
        TokenSource::Metadata {
            url: url.into(),
            cached: Mutex::new(None),
        }
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

// --- Wire types ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GceInstance {
    name: String,
    status: String,
    machine_type: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GceOperation {
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<GceOperationError>,
    #[serde(default)]
    warnings: Vec<GceWarning>,
    #[serde(default)]
    http_error_status_code: Option<u16>,
    #[serde(default)]
    http_error_message: Option<String>,
    #[serde(default)]
    target_link: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct GceOperationError {
    #[serde(default)]
    errors: Vec<GceErrorItem>,
}

#[derive(Deserialize, Debug, Default)]
struct GceErrorItem {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize, Debug, Default)]
struct GceWarning {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl From<GceOperation> for OperationState {
    fn from(op: GceOperation) -> Self {
        let first = op
            .error
            .and_then(|e| e.errors.into_iter().next());
        let error = match (first, op.http_error_status_code) {
            (Some(item), status) => Some(OperationFailure {
                code: item.code,
                message: if item.message.is_empty() {
                    op.http_error_message.clone().unwrap_or_default()
                } else {
                    item.message
                },
                http_status: status,
            }),
            (None, Some(status)) if status >= 400 => Some(OperationFailure {
                code: status.to_string(),
                message: op.http_error_message.clone().unwrap_or_default(),
                http_status: Some(status),
            }),
            (None, _) => None,
        };

        OperationState {
            name: op.name,
            done: op.status.eq_ignore_ascii_case("DONE"),
            error,
            warnings: op
                .warnings
                .into_iter()
                .map(|w| OperationWarning {
                    code: w.code,
                    message: w.message,
                })
                .collect(),
            target_link: op.target_link,
        }
    }
}

// --- Provider ---

/// Compute Engine REST client (`compute/v1`).
pub struct GceProvider {
    client: Client,
    api_base: String,
    auth: TokenSource,
}

impl GceProvider {
    pub fn new(api_base: &str, auth: TokenSource) -> anyhow::Result<Self> {
        // Without an overall timeout a stalled API call would hang the invocation.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn zone_url(&self, project: &str, zone: &str) -> String {
        format!(
            "{}/compute/v1/projects/{}/zones/{}",
            self.api_base, project, zone
        )
    }

    fn instance_url(&self, project: &str, zone: &str, instance: &str) -> String {
        format!("{}/instances/{}", self.zone_url(project, zone), instance)
    }

    async fn bearer(&self) -> Result<String> {
        match &self.auth {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata { url, cached } => {
                let mut guard = cached.lock().await;
                if let Some(c) = guard.as_ref() {
                    if Instant::now() < c.refresh_at {
                        return Ok(c.token.clone());
                    }
                }
                let resp = self
                    .client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    return Err(ComputeError::Transport(format!(
                        "metadata token request failed: status={}",
                        resp.status().as_u16()
                    )));
                }
                let token: MetadataToken = resp.json().await?;
                // Refreshed a minute before the token expires.
                let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
                *guard = Some(CachedToken {
                    token: token.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(token.access_token)
            }
        }
    }

    async fn check(
        resp: Response,
        url: &str,
        not_found: impl FnOnce() -> ComputeError,
    ) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            tracing::debug!("[GCE API] {} succeeded: status={}", url, status.as_u16());
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(
            "[GCE API] {} failed: status={} body={}",
            url,
            status.as_u16(),
            body
        );
        if status == StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        Err(ComputeError::Transport(format!(
            "{} returned status={} body={}",
            url,
            status.as_u16(),
            body
        )))
    }

    async fn submit(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        kind: OperationKind,
        body: serde_json::Value,
    ) -> Result<OperationHandle> {
        let url = format!("{}/{}", self.instance_url(project, zone, instance), kind.as_str());
        tracing::debug!("[GCE API] POST {} - instance={} zone={}", url, instance, zone);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.bearer().await?)
            .json(&body)
            .send()
            .await?;
        let resp = Self::check(resp, &url, || ComputeError::NotFound {
            project: project.to_string(),
            zone: zone.to_string(),
            instance: instance.to_string(),
        })
        .await?;

        let op: GceOperation = resp.json().await?;
        Ok(OperationHandle {
            name: op.name,
            project: project.to_string(),
            zone: zone.to_string(),
            kind,
        })
    }
}

#[async_trait]
impl ComputeProvider for GceProvider {
    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        timeout: Duration,
    ) -> Result<Instance> {
        let url = self.instance_url(project, zone, instance);
        tracing::debug!("[GCE API] GET {}", url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.bearer().await?)
            .timeout(timeout)
            .send()
            .await?;
        let resp = Self::check(resp, &url, || ComputeError::NotFound {
            project: project.to_string(),
            zone: zone.to_string(),
            instance: instance.to_string(),
        })
        .await?;

        let inst: GceInstance = resp.json().await?;
        Ok(Instance {
            name: inst.name,
            status: InstanceStatus::parse(&inst.status),
            machine_type: inst.machine_type,
        })
    }

    async fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<OperationHandle> {
        self.submit(project, zone, instance, OperationKind::Stop, json!({}))
            .await
    }

    async fn start_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<OperationHandle> {
        self.submit(project, zone, instance, OperationKind::Start, json!({}))
            .await
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
            json!({ "machineType": machine_type }),
        )
        .await
    }

    async fn get_operation(&self, operation: &OperationHandle) -> Result<OperationState> {
        let url = format!(
            "{}/operations/{}",
            self.zone_url(&operation.project, &operation.zone),
            operation.name
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.bearer().await?)
            .send()
            .await?;
        let resp = Self::check(resp, &url, || {
            ComputeError::Transport(format!("operation {} not found", operation.name))
        })
        .await?;

        let op: GceOperation = resp.json().await?;
        Ok(op.into())
    }

    fn name(&self) -> &'static str {
        "gce"
    }
}
