#![allow(clippy::must_use_candidate)]

mod env;
mod loader;
pub mod providers;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use providers::{ProviderConfig, ProviderType, RouteRule};
pub use server::{AuthConfig, CorsConfig, ServerConfig};
pub use telemetry::TelemetryConfig;

/// Top-level Prism configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Provider configurations keyed by name, in configuration order
    #[serde(default)]
    pub providers: indexmap::IndexMap<String, ProviderConfig>,
    /// Ordered model-prefix routing rules; derived from provider types when empty
    #[serde(default)]
    pub routes: Vec<RouteRule>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}

impl Config {
    /// Validate cross-references after deserialization
    ///
    /// # Errors
    ///
    /// Returns an error if a routing rule names a provider that is not
    /// configured
    pub fn validate(&self) -> anyhow::Result<()> {
        for rule in &self.routes {
            if !self.providers.contains_key(&rule.provider) {
                anyhow::bail!(
                    "route prefix `{}` names unknown provider `{}`",
                    rule.prefix,
                    rule.provider
                );
            }
        }
        Ok(())
    }
}
