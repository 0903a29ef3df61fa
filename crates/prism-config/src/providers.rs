use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single upstream provider
///
/// The `type` names the wire protocol, not the vendor: an xAI entry uses
/// `type = "openai"` with a `base_url` override.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider protocol type
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Upstream request timeout in seconds; the gateway adds no second layer
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Static model catalog override; replaces the provider's own listing
    #[serde(default)]
    pub models: Vec<String>,
}

/// Supported provider protocols
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// OpenAI-compatible API (OpenAI itself, xAI, and other clones)
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Google,
}

/// One entry in the ordered model-prefix routing table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    /// Model identifier prefix, matched case-insensitively
    pub prefix: String,
    /// Configured provider name the prefix routes to
    pub provider: String,
}

impl ProviderType {
    /// Default model-prefix rules for a provider of this protocol type
    pub fn default_prefixes(&self) -> &'static [&'static str] {
        match self {
            Self::Openai => &["gpt-", "o1-", "text-embedding-"],
            Self::Anthropic => &["claude-"],
            Self::Google => &["gemini-"],
        }
    }
}

impl RouteRule {
    /// Derive a routing table from provider entries when `[[routes]]` is absent
    ///
    /// Providers named after a known vendor get that vendor's conventional
    /// prefix; otherwise the protocol type's prefixes apply. Rules keep
    /// provider-configuration order, so first-match-wins stays predictable
    /// when two openai-type providers are configured.
    pub fn defaults<'a, I>(providers: I) -> Vec<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a ProviderConfig)>,
    {
        let mut rules = Vec::new();
        for (name, provider) in providers {
            let prefixes: &[&str] = match name.as_str() {
                "xai" | "grok" => &["grok-"],
                _ => provider.provider_type.default_prefixes(),
            };
            for prefix in prefixes {
                rules.push(Self {
                    prefix: (*prefix).to_owned(),
                    provider: name.clone(),
                });
            }
        }
        rules
    }
}
