//! Aggregated model catalog across all configured providers

use crate::registry::ProviderRegistry;
use crate::types::ModelDescriptor;

/// Collect the model catalogs of every provider, in configuration order
///
/// A provider that fails to list its models is logged and skipped rather
/// than failing the whole listing; the catalog degrades to whatever the
/// healthy providers report.
pub async fn aggregate_models(registry: &ProviderRegistry) -> Vec<ModelDescriptor> {
    let mut all = Vec::new();

    for (name, provider) in registry.iter() {
        match provider.list_models().await {
            Ok(models) => {
                tracing::debug!(provider = %name, count = models.len(), "collected models");
                all.extend(models);
            }
            Err(error) => {
                tracing::warn!(provider = %name, %error, "skipping provider in model listing");
            }
        }
    }

    all
}
