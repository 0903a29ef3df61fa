use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use prism_config::CorsConfig;

/// Build a Tower CORS layer from configuration
///
/// A `"*"` entry in the origin list allows any origin; otherwise only the
/// listed origins are accepted.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any());

    if config.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<http::HeaderValue> = config.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}
