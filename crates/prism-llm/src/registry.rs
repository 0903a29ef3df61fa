//! Provider registry and model-prefix routing
//!
//! Built once at startup from configuration. Construction is fail-fast: a
//! provider with broken credentials stops the gateway from starting instead
//! of surfacing as a 500 on first use.

use std::sync::Arc;

use indexmap::IndexMap;

use prism_config::{Config, ProviderType, RouteRule};

use crate::error::GatewayError;
use crate::provider::{Provider, anthropic::AnthropicProvider, google::GoogleProvider, openai::OpenAiProvider};

/// Registry of constructed providers plus the routing table
pub struct ProviderRegistry {
    /// Providers keyed by configured name, in configuration order
    providers: IndexMap<String, Arc<dyn Provider>>,
    /// Ordered prefix rules, first match wins
    routes: Vec<RouteRule>,
}

impl ProviderRegistry {
    /// Construct every configured provider and the routing table
    ///
    /// # Errors
    ///
    /// Returns the first [`GatewayError::Configuration`] encountered; a
    /// single broken provider entry fails the whole registry.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let mut providers: IndexMap<String, Arc<dyn Provider>> = IndexMap::new();

        for (name, provider_config) in &config.providers {
            let provider: Arc<dyn Provider> = match provider_config.provider_type {
                ProviderType::Openai => Arc::new(OpenAiProvider::new(name.clone(), provider_config)?),
                ProviderType::Anthropic => Arc::new(AnthropicProvider::new(name.clone(), provider_config)?),
                ProviderType::Google => Arc::new(GoogleProvider::new(name.clone(), provider_config)?),
            };
            tracing::info!(provider = %name, "registered provider");
            providers.insert(name.clone(), provider);
        }

        let routes = if config.routes.is_empty() {
            RouteRule::defaults(&config.providers)
        } else {
            config.routes.clone()
        };

        Ok(Self { providers, routes })
    }

    /// Look up a provider by its configured name, case-insensitively
    pub fn by_name(&self, name: &str) -> Result<&Arc<dyn Provider>, GatewayError> {
        self.providers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, provider)| provider)
            .ok_or_else(|| GatewayError::ProviderNotFound {
                provider: name.to_owned(),
            })
    }

    /// Resolve the provider responsible for a model identifier
    ///
    /// Walks the routing table in order and returns the first provider whose
    /// prefix matches the model name, compared case-insensitively.
    pub fn by_model(&self, model: &str) -> Result<&Arc<dyn Provider>, GatewayError> {
        let lowered = model.to_ascii_lowercase();

        for rule in &self.routes {
            if lowered.starts_with(&rule.prefix.to_ascii_lowercase()) {
                return self.by_name(&rule.provider);
            }
        }

        Err(GatewayError::ModelNotFound {
            model: model.to_owned(),
        })
    }

    /// Iterate providers in configuration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn Provider>)> {
        self.providers.iter()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry has no providers
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_parts(providers: IndexMap<String, Arc<dyn Provider>>, routes: Vec<RouteRule>) -> Self {
        Self { providers, routes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> Config {
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        config
    }

    #[test]
    fn registry_builds_from_full_config() {
        let config = config(
            r#"
            [providers.openai]
            type = "openai"
            api_key = "sk-test"

            [providers.anthropic]
            type = "anthropic"
            api_key = "sk-ant-test"

            [providers.gemini]
            type = "google"
            api_key = "g-test"

            [providers.xai]
            type = "openai"
            api_key = "xai-test"
            base_url = "https://api.x.ai/v1"
            "#,
        );

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 4);

        assert_eq!(registry.by_model("gpt-4").unwrap().name(), "openai");
        assert_eq!(registry.by_model("o1-preview").unwrap().name(), "openai");
        assert_eq!(registry.by_model("text-embedding-3-small").unwrap().name(), "openai");
        assert_eq!(registry.by_model("claude-3-opus-20240229").unwrap().name(), "anthropic");
        assert_eq!(registry.by_model("gemini-pro").unwrap().name(), "gemini");
        assert_eq!(registry.by_model("grok-beta").unwrap().name(), "xai");
    }

    #[test]
    fn model_matching_is_case_insensitive() {
        let config = config(
            r#"
            [providers.openai]
            type = "openai"
            api_key = "sk-test"
            "#,
        );

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.by_model("GPT-4").unwrap().name(), "openai");
    }

    #[test]
    fn unknown_model_is_rejected() {
        let config = config(
            r#"
            [providers.openai]
            type = "openai"
            api_key = "sk-test"
            "#,
        );

        let registry = ProviderRegistry::from_config(&config).unwrap();
        let err = registry.by_model("mistral-7b").err().expect("unroutable model must fail");
        assert!(matches!(err, GatewayError::ModelNotFound { model } if model == "mistral-7b"));
    }

    #[test]
    fn missing_api_key_fails_startup() {
        let config = config(
            r#"
            [providers.openai]
            type = "openai"
            "#,
        );

        let err = ProviderRegistry::from_config(&config).err().expect("missing key must fail startup");
        assert!(matches!(err, GatewayError::Configuration { .. }));
    }

    #[test]
    fn explicit_routes_override_defaults() {
        let config = config(
            r#"
            [providers.alt]
            type = "openai"
            api_key = "sk-test"
            base_url = "https://alt.example.com/v1"

            [[routes]]
            prefix = "my-"
            provider = "alt"
            "#,
        );

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.by_model("my-model").unwrap().name(), "alt");
        // Defaults are replaced, not merged
        assert!(registry.by_model("gpt-4").is_err());
    }

    #[test]
    fn provider_lookup_ignores_case() {
        let config = config(
            r#"
            [providers.OpenAI]
            type = "openai"
            api_key = "sk-test"
            "#,
        );

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.by_name("openai").is_ok());
        assert!(registry.by_name("missing").is_err());
    }
}
