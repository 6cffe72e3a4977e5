use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::error::ApiError;

/// `POST /users/{username}` -- registers a new user under the next free ID.
pub async fn create_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.users.create_user(&username).await?;
    Ok((StatusCode::CREATED, Json(account)))
}
