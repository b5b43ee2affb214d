use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::services::ServeDir;

use crate::http::handlers;
use crate::http::middleware::cache_index_page;
use crate::infra::storage::MediaStorage;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/groups", post(handlers::admin_create_group))
        .route("/admin/groups/:slug", delete(handlers::admin_delete_group))
        .route("/admin/users/:username", delete(handlers::admin_delete_user))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/signup/",
            get(handlers::signup_form).post(handlers::signup),
        )
        .route(
            "/auth/login/",
            get(handlers::login_form).post(handlers::login),
        )
        .route("/auth/logout/", get(handlers::logout).post(handlers::logout))
}

pub fn about() -> Router<AppState> {
    Router::new()
        .route("/about/author/", get(handlers::about_author))
        .route("/about/tech/", get(handlers::about_tech))
}

pub fn posts(state: &AppState) -> Router<AppState> {
    let upload_limit = state.upload_max_bytes;

    Router::new()
        .route(
            "/",
            get(handlers::index).route_layer(middleware::from_fn_with_state(
                state.clone(),
                cache_index_page,
            )),
        )
        .route("/group/:slug/", get(handlers::group_posts))
        .route("/follow/", get(handlers::follow_index))
        .route(
            "/new/",
            get(handlers::new_post_form)
                .post(handlers::new_post)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/:username/", get(handlers::profile))
        .route("/:username/follow/", get(handlers::profile_follow))
        .route("/:username/unfollow/", get(handlers::profile_unfollow))
        .route("/:username/:post_id/", get(handlers::post_view))
        .route(
            "/:username/:post_id/edit/",
            get(handlers::post_edit_form)
                .post(handlers::post_edit)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/:username/:post_id/comment/",
            get(handlers::comment_form_redirect).post(handlers::add_comment),
        )
}

/// Uploaded images, when they live on local disk and are published under a
/// path of this site.
pub fn media(state: &AppState) -> Router<AppState> {
    let MediaStorage::Local(storage) = &state.storage else {
        return Router::new();
    };
    let mount = state.storage.base_url().trim_end_matches('/');
    if !mount.starts_with('/') || mount.is_empty() {
        return Router::new();
    }
    Router::new().nest_service(mount, ServeDir::new(storage.root()))
}
