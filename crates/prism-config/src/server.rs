use std::net::SocketAddr;

use secrecy::SecretString;
use serde::Deserialize;

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address; defaults to 0.0.0.0:8000
    pub listen_address: Option<SocketAddr>,
    /// CORS settings; no layer is applied when absent
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    /// API key authentication; requests pass unauthenticated when absent
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_origins() -> Vec<String> {
    vec!["*".to_owned()]
}

/// Bearer-token authentication configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Accepted API keys; an empty list accepts any non-empty bearer token
    /// (development mode)
    #[serde(default)]
    pub api_keys: Vec<SecretString>,
    /// Paths served without authentication
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec!["/".to_owned(), "/health".to_owned()]
}
