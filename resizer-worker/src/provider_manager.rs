use crate::settings::Settings;
use resizer_providers::ComputeProvider;
use std::sync::Arc;

pub struct ProviderManager;

impl ProviderManager {
    /// Builds the compute client once per process; callers share it through the `Arc`.
    pub fn get_provider(settings: &Settings) -> anyhow::Result<Arc<dyn ComputeProvider>> {
        match settings.provider.to_lowercase().as_str() {
            #[cfg(feature = "provider-gce")]
            "gce" => {
                use resizer_providers::gce::{GceProvider, TokenSource};
                let auth = match &settings.gce_access_token {
                    Some(token) => TokenSource::Static(token.clone()),
                    None => TokenSource::metadata(settings.gce_metadata_url.clone()),
                };
                Ok(Arc::new(GceProvider::new(&settings.gce_api_base, auth)?))
            }
            #[cfg(feature = "provider-mock")]
            "mock" => {
                let mock = resizer_providers::mock::MockProvider::from_spec(
                    settings.mock_instances.as_deref().unwrap_or(""),
                )?;
                Ok(Arc::new(mock))
            }
            // Add other providers here.
            other => anyhow::bail!(
                "unknown or disabled compute provider '{}' (check PROVIDER and enabled features)",
                other
            ),
        }
    }
}
