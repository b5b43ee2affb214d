use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::http::AppError;
use crate::AppState;

pub const INDEX_CACHE_PREFIX: &str = "index_page:";

/// Serves `GET` responses of the wrapped route from the page cache for
/// `index_cache_seconds`. Entries are keyed per URL and per cookie header,
/// so a signed-in visitor never receives another visitor's navigation bar.
pub async fn cache_index_page(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.method() != Method::GET || state.index_cache_seconds == 0 {
        return Ok(next.run(request).await);
    }

    let key = cache_key(request.uri(), request.headers().get(header::COOKIE));
    match state.cache.get(&key).await {
        Ok(Some(body)) => {
            tracing::debug!(key = %key, "index page served from cache");
            return Ok(html(body));
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(error = ?err, "page cache read failed"),
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || response.headers().contains_key(header::SET_COOKIE)
    {
        return Ok(response);
    }

    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to buffer index page");
        AppError::internal("failed to render page")
    })?;

    let ttl = Duration::from_secs(state.index_cache_seconds);
    if let Err(err) = state.cache.set(&key, bytes.clone(), ttl).await {
        tracing::warn!(error = ?err, "page cache write failed");
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

fn cache_key(uri: &Uri, cookie: Option<&HeaderValue>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uri.to_string().as_bytes());
    hasher.update(b"\n");
    if let Some(cookie) = cookie {
        hasher.update(cookie.as_bytes());
    }
    format!("{}{}", INDEX_CACHE_PREFIX, hex::encode(hasher.finalize()))
}

fn html(body: bytes::Bytes) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Body::from(body),
    )
        .into_response()
}
