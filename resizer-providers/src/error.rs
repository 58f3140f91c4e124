use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("instance {instance} not found in project {project}, zone {zone}")]
    NotFound {
        project: String,
        zone: String,
        instance: String,
    },

    /// Failed operation whose error was carried by the service itself.
    #[error("{label} failed (HTTP {http_status}): [Code: {code}]: {message}")]
    Operation {
        label: String,
        code: String,
        message: String,
        http_status: u16,
    },

    /// Failed operation with only an error code/message to go on.
    #[error("{label} failed: {message}")]
    Runtime {
        label: String,
        code: String,
        message: String,
    },

    #[error("{label} did not complete within {timeout:?}")]
    Timeout { label: String, timeout: Duration },

    #[error("compute API transport error: {0}")]
    Transport(String),

    #[error("instance {instance} still reports {status} after stop")]
    NotStopped { instance: String, status: String },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ComputeError {
    /// Error code of a failed operation, if this is one.
    pub fn operation_code(&self) -> Option<&str> {
        match self {
            ComputeError::Operation { code, .. } | ComputeError::Runtime { code, .. } => {
                Some(code.as_str())
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ComputeError::Timeout { .. })
    }
}

impl From<reqwest::Error> for ComputeError {
    fn from(e: reqwest::Error) -> Self {
        ComputeError::Transport(e.to_string())
    }
}
