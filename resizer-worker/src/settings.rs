use anyhow::Context;
use resizer_common::bus::CHANNEL_RESIZE_REQUESTS;
use std::net::SocketAddr;
use std::time::Duration;

use crate::operation_waiter::WaitOptions;
use crate::resize::ResizeOptions;

pub const DEFAULT_GCE_API_BASE: &str = "https://compute.googleapis.com";
pub const DEFAULT_GCE_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Process configuration, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: String,
    pub gce_api_base: String,
    pub gce_access_token: Option<String>,
    pub gce_metadata_url: String,
    pub listen_addr: SocketAddr,
    pub redis_url: Option<String>,
    pub resize_channel: String,
    pub mock_instances: Option<String>,
    pub resize: ResizeOptions,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Settings::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |name: &str, default: Duration| -> anyhow::Result<Duration> {
            match get(name) {
                Some(v) => Ok(Duration::from_secs(
                    v.parse::<u64>()
                        .with_context(|| format!("{} must be a number of seconds, got '{}'", name, v))?,
                )),
                None => Ok(default),
            }
        };

        let defaults = ResizeOptions::default();

        // Prefer *_FILE for secrets (Docker/K8s friendly), fallback to env var.
        let gce_access_token = match get("GCE_ACCESS_TOKEN_FILE") {
            Some(path) => Some(
                std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read GCE_ACCESS_TOKEN_FILE {}", path))?
                    .trim()
                    .to_string(),
            )
            .filter(|t| !t.is_empty()),
            None => get("GCE_ACCESS_TOKEN"),
        };

        let listen_addr = get("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let listen_addr: SocketAddr = listen_addr
            .parse()
            .with_context(|| format!("LISTEN_ADDR '{}' is not a socket address", listen_addr))?;

        let poll_interval = match get("OPERATION_POLL_INTERVAL_MS") {
            Some(v) => Duration::from_millis(v.parse::<u64>().with_context(|| {
                format!("OPERATION_POLL_INTERVAL_MS must be a number, got '{}'", v)
            })?),
            None => defaults.wait.poll_interval,
        };

        // 0 disables the cap, same as leaving it unset.
        let deadline = Some(secs("RESIZE_DEADLINE_SECS", Duration::ZERO)?)
            .filter(|d| !d.is_zero());

        Ok(Self {
            provider: get("PROVIDER").unwrap_or_else(|| "gce".to_string()),
            gce_api_base: get("GCE_API_BASE").unwrap_or_else(|| DEFAULT_GCE_API_BASE.to_string()),
            gce_access_token,
            gce_metadata_url: get("GCE_METADATA_URL")
                .unwrap_or_else(|| DEFAULT_GCE_METADATA_TOKEN_URL.to_string()),
            listen_addr,
            redis_url: get("REDIS_URL"),
            resize_channel: get("RESIZE_CHANNEL")
                .unwrap_or_else(|| CHANNEL_RESIZE_REQUESTS.to_string()),
            mock_instances: get("MOCK_INSTANCES"),
            resize: ResizeOptions {
                wait: WaitOptions {
                    timeout: secs("OPERATION_TIMEOUT_SECS", defaults.wait.timeout)?,
                    poll_interval,
                },
                get_timeout: secs("INSTANCE_GET_TIMEOUT_SECS", defaults.get_timeout)?,
                deadline,
            },
        })
    }
}
