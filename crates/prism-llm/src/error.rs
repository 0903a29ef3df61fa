use http::StatusCode;
use prism_core::HttpError;
use thiserror::Error;

/// Errors that can occur while dispatching to a provider
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No routing rule matched the requested model
    #[error("no provider found for model: {model}")]
    ModelNotFound { model: String },

    /// Named provider does not exist in configuration
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// Provider is configured but cannot be constructed
    #[error("provider {provider} is missing required setting: {setting}")]
    Configuration { provider: String, setting: String },

    /// Upstream provider returned an error
    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Error during streaming response
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Provider cannot perform the requested operation
    #[error("provider {provider} does not support {capability}")]
    Unsupported {
        provider: String,
        capability: &'static str,
    },

    /// Operation is recognized but not yet available for this provider
    #[error("{operation} is not implemented for provider {provider}")]
    NotImplemented {
        provider: String,
        operation: &'static str,
    },

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Build an upstream error from a provider's HTTP failure
    pub fn upstream(provider: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ModelNotFound { .. }
            | Self::ProviderNotFound { .. }
            | Self::InvalidRequest(_)
            | Self::Unsupported { .. } => StatusCode::BAD_REQUEST,
            Self::Configuration { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { status, .. } => match status {
                // Client-side mistakes surfaced by the upstream become our
                // client's mistake, except rate limits which pass through.
                Some(s @ 400..=499) if *s != 429 => StatusCode::BAD_REQUEST,
                Some(429) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Streaming(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::ModelNotFound { .. }
            | Self::ProviderNotFound { .. }
            | Self::InvalidRequest(_)
            | Self::Unsupported { .. } => "invalid_request_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Upstream { status, .. } => match status {
                Some(429) => "rate_limit_error",
                _ => "upstream_error",
            },
            Self::Streaming(_) => "streaming_error",
            Self::NotImplemented { .. } => "not_implemented_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn error_code(&self) -> Option<&str> {
        match self {
            Self::ModelNotFound { .. } => Some("model_not_found"),
            Self::ProviderNotFound { .. } => Some("provider_not_found"),
            _ => None,
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            // Never echo what the missing setting might contain, only its name.
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_is_a_client_error() {
        let err = GatewayError::ModelNotFound {
            model: "mistral-7b".to_owned(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), Some("model_not_found"));
    }

    #[test]
    fn upstream_client_errors_remap_to_bad_request() {
        let err = GatewayError::upstream("openai", Some(404), "model does not exist");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_rate_limit_passes_through() {
        let err = GatewayError::upstream("anthropic", Some(429), "overloaded");
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.error_type(), "rate_limit_error");
    }

    #[test]
    fn upstream_server_errors_become_bad_gateway() {
        let err = GatewayError::upstream("google", Some(500), "internal");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = GatewayError::upstream("google", None, "connection refused");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = GatewayError::Internal(anyhow::anyhow!("secret detail"));
        assert_eq!(err.client_message(), "an internal error occurred");
    }
}
