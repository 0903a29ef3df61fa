use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prism_core::RequestContext;

use crate::auth::AuthedApiKey;

/// Middleware that constructs a `RequestContext` from the incoming request
///
/// Extracts HTTP parts and the bearer token resolved by authentication into a
/// unified context for downstream handlers
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let api_key = parts.extensions.get::<AuthedApiKey>().map(|key| key.0.clone());

    let context = RequestContext {
        parts: parts.clone(),
        api_key,
    };

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(context);

    next.run(request).await
}

#[cfg(test)]
mod test {
    use axum::routing::get;
    use axum::{Extension, Router};
    use http::StatusCode;
    use secrecy::{ExposeSecret, SecretString};
    use tower::ServiceExt;

    use super::*;

    async fn echo_key(Extension(context): Extension<RequestContext>) -> String {
        context.api_key.map(|k| k.expose_secret().to_string()).unwrap_or_default()
    }

    #[tokio::test]
    async fn context_carries_authed_key() {
        let app = Router::new()
            .route("/", get(echo_key))
            .layer(axum::middleware::from_fn(request_context_middleware));

        let mut request = http::Request::builder().uri("/").body(axum::body::Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(AuthedApiKey(SecretString::from("sk-test".to_string())));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn context_present_without_auth() {
        let app = Router::new()
            .route("/", get(echo_key))
            .layer(axum::middleware::from_fn(request_context_middleware));

        let request = http::Request::builder().uri("/").body(axum::body::Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
