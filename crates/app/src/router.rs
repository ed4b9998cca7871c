use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use services::AppServices;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::session::CookieSettings;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    pub cookies: CookieSettings,
}

/// Build the full API router with tracing and credentialed CORS.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| {
            let origin = origin.trim();
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(origin, "ignoring invalid CORS origin"))
                .ok()
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/register", post(handlers::register))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/check-auth", get(handlers::check_auth))
        .route("/api/questions/:form_type", get(handlers::questions))
        .route(
            "/api/user-details",
            get(handlers::get_user_details).post(handlers::save_user_details),
        )
        .route("/api/save-progress", post(handlers::save_progress))
        .route("/api/submit-form", post(handlers::submit_form))
        .route("/api/responses/:form_name", get(handlers::get_responses))
        .route("/api/progress", get(handlers::progress))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
