use resizer_providers::ComputeProvider;
use std::sync::Arc;

pub mod handler;
pub mod inspector;
pub mod listener;
pub mod operation_waiter;
pub mod provider_manager;
pub mod resize;
pub mod routes;
pub mod settings;

pub struct AppState {
    pub provider: Arc<dyn ComputeProvider>,
    pub options: resize::ResizeOptions,
}
