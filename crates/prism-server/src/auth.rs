use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use prism_config::AuthConfig;
use secrecy::{ExposeSecret, SecretString};

/// Bearer token resolved by authentication, consumed by the request context
#[derive(Clone)]
pub struct AuthedApiKey(pub SecretString);

/// Authenticate requests via bearer token
///
/// Public paths pass through untouched. When no keys are configured the
/// middleware runs in development mode and accepts any non-empty token.
pub async fn auth_middleware(config: Arc<AuthConfig>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    // Exact match; a "/" entry must not open up every route
    if config.public_paths.iter().any(|p| *p == path) {
        return next.run(request).await;
    }

    // Owned copy so the request can be mutated below
    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(str::to_owned);

    let Some(token) = token else {
        return unauthorized("missing bearer token");
    };

    let accepted = config.api_keys.is_empty()
        || config.api_keys.iter().any(|k| k.expose_secret() == token);

    if !accepted {
        tracing::warn!(%path, "rejected request with unrecognized API key");
        return unauthorized("invalid API key");
    }

    let mut request = request;
    request.extensions_mut().insert(AuthedApiKey(SecretString::from(token)));
    next.run(request).await
}

fn unauthorized(message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "message": message,
            "type": "authentication_error",
        }
    });
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

#[cfg(test)]
mod test {
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    fn app(api_keys: Vec<&str>) -> Router {
        let config = Arc::new(AuthConfig {
            api_keys: api_keys.into_iter().map(|k| SecretString::from(k.to_string())).collect(),
            public_paths: vec!["/health".to_owned()],
        });
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/v1/models", get(|| async { "models" }))
            .layer(axum::middleware::from_fn(move |req, next| {
                let config = Arc::clone(&config);
                async move { auth_middleware(config, req, next).await }
            }))
    }

    fn get_request(path: &str, bearer: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri(path);
        if let Some(token) = bearer {
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(axum::body::Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn public_path_skips_auth() {
        let response = app(vec!["sk-secret"]).oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let response = app(vec!["sk-secret"]).oneshot(get_request("/v1/models", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let response = app(vec!["sk-secret"])
            .oneshot(get_request("/v1/models", Some("sk-wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn matching_token_is_accepted() {
        let response = app(vec!["sk-other", "sk-secret"])
            .oneshot(get_request("/v1/models", Some("sk-secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn accepted_token_is_forwarded_as_extension() {
        // Extraction fails with a 500 if the middleware did not insert the key
        async fn requires_key(axum::Extension(key): axum::Extension<AuthedApiKey>) -> StatusCode {
            assert_eq!(key.0.expose_secret(), "sk-secret");
            StatusCode::OK
        }

        let config = Arc::new(AuthConfig {
            api_keys: vec![SecretString::from("sk-secret")],
            public_paths: vec![],
        });
        let app = Router::new()
            .route("/v1/models", get(requires_key))
            .layer(axum::middleware::from_fn(move |req, next| {
                let config = Arc::clone(&config);
                async move { auth_middleware(config, req, next).await }
            }));

        let response = app
            .oneshot(get_request("/v1/models", Some("sk-secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_key_list_accepts_any_nonempty_token() {
        let response = app(vec![])
            .oneshot(get_request("/v1/models", Some("anything")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(vec![]).oneshot(get_request("/v1/models", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
