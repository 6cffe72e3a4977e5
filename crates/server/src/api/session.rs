use axum::Json;
use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::info;

use portier_core::{UserId, UserIdentity};

use super::error::ApiError;
use super::{AppState, header_pairs};

#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub msg: &'static str,
    #[serde(flatten)]
    pub user: UserIdentity,
    pub request_headers: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub request_headers: Vec<(String, String)>,
}

impl SessionResponse {
    fn new(msg: impl Into<String>, headers: &HeaderMap) -> Self {
        Self {
            msg: msg.into(),
            username: None,
            user_id: None,
            request_headers: header_pairs(headers),
        }
    }

    fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    fn user_id(mut self, id: UserId) -> Self {
        self.user_id = Some(id);
        self
    }
}

/// `GET /` -- greets the caller as identified by the gateway.
pub async fn hello(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HelloResponse>, ApiError> {
    let user = state.users.current_user(&headers)?;
    Ok(Json(HelloResponse {
        msg: "hello",
        user,
        request_headers: header_pairs(&headers),
    }))
}

/// `GET /login/{username}` -- exchanges the user's gateway key for a session
/// cookie and hands it to the browser.
pub async fn login(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let current = state.users.current_user(&headers)?;
    if let UserIdentity::Authenticated(account) = current {
        let body = if account.username == username {
            SessionResponse::new("already login", &headers)
                .username(username)
                .user_id(account.id)
        } else {
            SessionResponse::new("login fail, already login status", &headers)
                .username(account.username)
        };
        return Ok(Json(body).into_response());
    }

    let Some(account) = state.users.get_by_username(&username).await? else {
        let body = SessionResponse::new(format!("user {username} not exists"), &headers)
            .username(username);
        return Ok(Json(body).into_response());
    };

    let Some(cookie) = state.users.login(&account, &headers).await? else {
        let body = SessionResponse::new("Can't get cookie for kong session auth", &headers);
        return Ok(Json(body).into_response());
    };

    let set_cookie = session_cookie(state.users.session_cookie_name(), &cookie)?;
    info!(user_id = account.id.get(), "user logged in");
    let body = SessionResponse::new("success", &headers)
        .username(account.username)
        .user_id(account.id);
    Ok(([(SET_COOKIE, set_cookie)], Json(body)).into_response())
}

/// `GET /logout` -- clears the session cookie unless the gateway flagged the
/// request as anonymous.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if state.users.trusted_headers().is_anonymous(&headers) {
        return Ok(Json(SessionResponse::new("already logout", &headers)).into_response());
    }

    let expired = expired_cookie(state.users.session_cookie_name())?;
    let body = SessionResponse::new("success", &headers);
    Ok(([(SET_COOKIE, expired)], Json(body)).into_response())
}

fn session_cookie(name: &str, value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!("{name}={value}; Path=/"))
        .map_err(|e| ApiError::Internal(format!("invalid session cookie: {e}")))
}

fn expired_cookie(name: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!(
        "{name}=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; Path=/"
    ))
    .map_err(|e| ApiError::Internal(format!("invalid cookie name: {e}")))
}
