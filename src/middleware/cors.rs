use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Status endpoints are read by dashboards on other origins
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(60 * 60))
}
