use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tera::Context;

use crate::http::error::ErrorPage;
use crate::AppState;

/// Swaps the JSON body of a 404 or 5xx [`crate::http::AppError`] for the
/// matching HTML page, keeping the status code.
pub async fn error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    if response.extensions().get::<ErrorPage>().is_none() {
        return response;
    }

    let status = response.status();
    let template = if status == StatusCode::NOT_FOUND {
        "misc/404.html"
    } else {
        "misc/500.html"
    };

    let mut context = Context::new();
    context.insert("user", &None::<()>);
    context.insert("path", &path);

    match state.templates.render(template, &context) {
        Ok(page) => (status, page).into_response(),
        Err(_) => response,
    }
}
