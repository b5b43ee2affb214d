use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderName;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::app::auth::AuthService;
use crate::http::{found, AppError};
use crate::AppState;

pub const SESSION_COOKIE: &str = "yatube_session";
pub const LOGIN_URL: &str = "/auth/login/";

/// The signed-in user. Extracting it on an anonymous request redirects to
/// the login page, carrying the requested path in `next`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct AdminToken;

const ADMIN_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-admin-token");

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let next = parts
            .uri
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");
        let to_login = || found(&login_url(next));

        let jar = CookieJar::from_headers(&parts.headers);
        let token = match jar.get(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => return Err(to_login()),
        };

        let service = AuthService::new(
            state.db.clone(),
            state.paseto_access_key,
            state.access_ttl_minutes,
        );
        let session = service.authenticate_access_token(&token).map_err(|err| {
            tracing::warn!(error = ?err, "rejected malformed session token");
            to_login()
        })?;
        let session = session.ok_or_else(to_login)?;

        let user = service
            .get_current_user(session.user_id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = session.user_id, "failed to load session user");
                AppError::internal("failed to authenticate").into_response()
            })?;

        // Deleted accounts fall back to anonymous.
        let user = user.ok_or_else(to_login)?;
        Ok(AuthUser {
            user_id: user.id,
            username: user.username,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .admin_token
            .as_ref()
            .ok_or_else(|| AppError::forbidden("admin token not configured"))?;

        let provided = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::forbidden("missing admin token"))?;

        if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AppError::forbidden("invalid admin token"));
        }

        Ok(AdminToken)
    }
}

/// `/auth/login/?next=<path>`, with the path query-encoded but its slashes
/// left readable.
pub fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", LOGIN_URL, encoded.replace("%2F", "/"))
}

/// Only same-site absolute paths are honored as post-login targets.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") => next,
        _ => "/",
    }
}

pub fn session_cookie(token: String, ttl_minutes: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::minutes(ttl_minutes as i64))
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
