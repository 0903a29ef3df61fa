use secrecy::SecretString;

/// Runtime context for provider requests
///
/// Constructed by the server middleware before any handler runs and shared
/// with every adapter call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP request parts (method, URI, headers, extensions)
    pub parts: http::request::Parts,
    /// Authenticated API key extracted by the auth layer
    pub api_key: Option<SecretString>,
}

impl RequestContext {
    /// Create a minimal context for embedded (non-HTTP) use
    ///
    /// Contains empty headers and no API key
    pub fn empty() -> Self {
        let (parts, _) = http::Request::builder()
            .method(http::Method::GET)
            .uri("/")
            .body(())
            .expect("valid minimal request")
            .into_parts();

        Self { parts, api_key: None }
    }

    /// Access request headers
    pub fn headers(&self) -> &http::HeaderMap {
        &self.parts.headers
    }
}

/// Dispatch record the router attaches to the response as a side effect
///
/// The observability layer reads these fields; the core never emits metrics
/// itself.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Configured provider name that served the request
    pub provider: String,
    /// Model identifier sent upstream
    pub model: String,
    /// Whether the response was streamed
    pub is_streaming: bool,
    /// Token usage, when the provider reported it before the response left
    pub usage: Option<TokenUsage>,
}

/// Token counts as reported by a provider
#[derive(Debug, Clone, Copy)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion, when reported
    pub completion_tokens: Option<u32>,
    /// Total tokens
    pub total_tokens: u32,
}
