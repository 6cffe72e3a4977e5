pub mod error;
pub mod health;
pub mod session;
pub mod users;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use portier_identity::UserService;

/// Shared state for all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
}

impl AppState {
    pub fn new(users: UserService) -> Self {
        Self {
            users: Arc::new(users),
        }
    }
}

/// Build the Axum router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(session::hello))
        .route("/login/{username}", get(session::login))
        .route("/logout", get(session::logout))
        .route("/users/{username}", post(users::create_user))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// The request headers as `[name, value]` pairs, echoed back to clients.
/// Values that are not valid text are sent lossily decoded.
pub(crate) fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
