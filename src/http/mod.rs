use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;

use crate::AppState;

mod auth;
mod error;
mod extract;
mod handlers;
pub mod middleware;
mod routes;
pub mod templates;

pub use auth::{login_url, AdminToken, AuthUser, SESSION_COOKIE};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let site = Router::new()
        .merge(routes::posts(&state))
        .merge(routes::auth())
        .merge(routes::about())
        .merge(routes::media(&state))
        .fallback(handlers::page_not_found);

    Router::new()
        .merge(routes::health())
        .merge(routes::admin())
        .merge(with_error_pages(site, &state))
        .with_state(state)
}

/// Turns handler panics into 500s and renders every 404/5xx from `site` as
/// an HTML error page.
pub fn with_error_pages(site: Router<AppState>, state: &AppState) -> Router<AppState> {
    site.layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::error_pages,
        ))
}

/// A `302 Found` redirect.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Percent-encodes a value for use as a single URL path segment.
pub(crate) fn path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("request handler panicked");
    AppError::internal("internal server error").into_response()
}
