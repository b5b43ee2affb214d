use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::feed::FeedService;
use crate::app::forms::{
    validate_post, CommentForm, FormErrors, ImageChange, LoginForm, PostFormData, SignupForm,
    ValidImage,
};
use crate::app::groups::GroupService;
use crate::app::posts::{PostFilter, PostService};
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::group::{is_valid_slug, Group};
use crate::domain::post::Post;
use crate::http::auth::{expired_session_cookie, safe_next, session_cookie};
use crate::http::extract::PostSubmission;
use crate::http::{found, path_segment, AdminToken, AppError, AuthUser};
use crate::AppState;

const GROUP_TITLE_MAX_LEN: usize = 200;
const INVALID_LOGIN: &str = "Please enter a correct username and password. \
     Note that both fields may be case-sensitive.";

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Field values echoed back into the post form.
#[derive(Serialize, Default)]
struct PostFormValues {
    text: String,
    group: String,
}

impl From<&PostFormData> for PostFormValues {
    fn from(data: &PostFormData) -> Self {
        Self {
            text: data.text.clone(),
            group: data.group.trim().to_string(),
        }
    }
}

impl From<&Post> for PostFormValues {
    fn from(post: &Post) -> Self {
        Self {
            text: post.text.clone(),
            group: post
                .group
                .as_ref()
                .map(|group| group.id.to_string())
                .unwrap_or_default(),
        }
    }
}

fn page_context(state: &AppState, user: Option<&AuthUser>) -> Context {
    let mut context = Context::new();
    context.insert("user", &user);
    context.insert("media_url", state.storage.base_url());
    context
}

pub fn profile_url(username: &str) -> String {
    format!("/{}/", path_segment(username))
}

pub fn post_url(username: &str, post_id: i64) -> String {
    format!("/{}/{}/", path_segment(username), post_id)
}

/// Post ids only ever match a run of ASCII digits; anything else is a
/// missing page rather than a bad request.
fn parse_post_id(raw: &str) -> Result<i64, AppError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::not_found("post not found"));
    }
    raw.parse()
        .map_err(|_| AppError::not_found("post not found"))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let cache = state.cache.ping().await.is_ok();
    let status = if db && cache { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub async fn index(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let page = FeedService::new(state.db.clone())
        .page(PostFilter::All, query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to load index feed");
            AppError::internal("failed to load posts")
        })?;

    let mut context = page_context(&state, user.as_ref());
    context.insert("page", &page);
    state.templates.render("index.html", &context)
}

pub async fn group_posts(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let group = GroupService::new(state.db.clone())
        .get_by_slug(&slug)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, slug = %slug, "failed to load group");
            AppError::internal("failed to load group")
        })?
        .ok_or_else(|| AppError::not_found("group not found"))?;

    let page = FeedService::new(state.db.clone())
        .page(PostFilter::Group(group.id), query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, group_id = group.id, "failed to load group feed");
            AppError::internal("failed to load posts")
        })?;

    let mut context = page_context(&state, user.as_ref());
    context.insert("group", &group);
    context.insert("page", &page);
    state.templates.render("group.html", &context)
}

pub async fn profile(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let users = UserService::new(state.db.clone());
    let author = users
        .get_by_username(&username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to load profile");
            AppError::internal("failed to load profile")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let page = FeedService::new(state.db.clone())
        .page(PostFilter::Author(author.id), query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = author.id, "failed to load profile feed");
            AppError::internal("failed to load posts")
        })?;

    let stats = users.profile_stats(author.id).await.map_err(|err| {
        tracing::error!(error = ?err, author_id = author.id, "failed to load profile stats");
        AppError::internal("failed to load profile")
    })?;

    let following = is_following(&state, user.as_ref(), author.id).await?;

    let mut context = page_context(&state, user.as_ref());
    context.insert("author", &author);
    context.insert("stats", &stats);
    context.insert("following", &following);
    context.insert("page", &page);
    state.templates.render("posts/profile.html", &context)
}

pub async fn post_view(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> Result<Html<String>, AppError> {
    let post = load_post(&state, &username, &post_id).await?;

    let comments = CommentService::new(state.db.clone())
        .list_for_post(post.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = post.id, "failed to load comments");
            AppError::internal("failed to load comments")
        })?;

    let stats = UserService::new(state.db.clone())
        .profile_stats(post.author_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = post.author_id, "failed to load author stats");
            AppError::internal("failed to load post")
        })?;

    let following = is_following(&state, user.as_ref(), post.author_id).await?;

    let mut context = page_context(&state, user.as_ref());
    context.insert("post", &post);
    context.insert("comments", &comments);
    context.insert("stats", &stats);
    context.insert("following", &following);
    context.insert("errors", &FormErrors::default());
    state.templates.render("posts/post.html", &context)
}

pub async fn new_post_form(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let groups = list_groups(&state).await?;
    render_post_form(
        &state,
        &user,
        &PostFormValues::default(),
        &FormErrors::default(),
        &groups,
        None,
    )
}

pub async fn new_post(
    user: AuthUser,
    State(state): State<AppState>,
    PostSubmission(data): PostSubmission,
) -> Result<Response, AppError> {
    let groups = list_groups(&state).await?;
    let valid = match validate_post(&data, &groups) {
        Ok(valid) => valid,
        Err(errors) => {
            return render_post_form(&state, &user, &PostFormValues::from(&data), &errors, &groups, None)
        }
    };

    let image = match &valid.image {
        ImageChange::Replace(image) => Some(store_image(&state, image).await?),
        ImageChange::Keep | ImageChange::Clear => None,
    };

    let post = PostService::new(state.db.clone())
        .create_post(user.user_id, &valid.text, valid.group_id, image.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = user.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    tracing::info!(post_id = post.id, author_id = user.user_id, "post created");
    Ok(found("/"))
}

pub async fn post_edit_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let post = load_post(&state, &username, &post_id).await?;
    if post.author_id != user.user_id {
        return Ok(found(&post_url(&post.author_username, post.id)));
    }

    let groups = list_groups(&state).await?;
    render_post_form(
        &state,
        &user,
        &PostFormValues::from(&post),
        &FormErrors::default(),
        &groups,
        Some(&post),
    )
}

pub async fn post_edit(
    user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
    PostSubmission(data): PostSubmission,
) -> Result<Response, AppError> {
    let post = load_post(&state, &username, &post_id).await?;
    let target = post_url(&post.author_username, post.id);
    if post.author_id != user.user_id {
        return Ok(found(&target));
    }

    let groups = list_groups(&state).await?;
    let valid = match validate_post(&data, &groups) {
        Ok(valid) => valid,
        Err(errors) => {
            return render_post_form(&state, &user, &PostFormValues::from(&data), &errors, &groups, Some(&post))
        }
    };

    let image = match &valid.image {
        ImageChange::Keep => post.image.clone(),
        ImageChange::Clear => None,
        ImageChange::Replace(image) => Some(store_image(&state, image).await?),
    };

    PostService::new(state.db.clone())
        .update_post(post.id, &valid.text, valid.group_id, image.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = post.id, "failed to update post");
            AppError::internal("failed to update post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    tracing::info!(post_id = post.id, "post updated");
    Ok(found(&target))
}

/// An empty comment is dropped without feedback; either way the visitor
/// lands back on the post.
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let post = load_post(&state, &username, &post_id).await?;
    let target = post_url(&post.author_username, post.id);

    let Ok(text) = form.validate() else {
        return Ok(found(&target));
    };

    let comment = CommentService::new(state.db.clone())
        .add_comment(post.id, user.user_id, &text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = post.id, "failed to add comment");
            AppError::internal("failed to add comment")
        })?;

    tracing::info!(comment_id = comment.id, post_id = post.id, "comment added");
    Ok(found(&target))
}

/// A comment URL opened directly is an empty submission.
pub async fn comment_form_redirect(
    _user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let post = load_post(&state, &username, &post_id).await?;
    Ok(found(&post_url(&post.author_username, post.id)))
}

pub async fn follow_index(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let page = FeedService::new(state.db.clone())
        .page(PostFilter::FollowedBy(user.user_id), query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = user.user_id, "failed to load follow feed");
            AppError::internal("failed to load posts")
        })?;

    let mut context = page_context(&state, Some(&user));
    context.insert("page", &page);
    state.templates.render("follow.html", &context)
}

pub async fn profile_follow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = load_user(&state, &username).await?;

    if author.id != user.user_id {
        let follow = SocialService::new(state.db.clone())
            .follow(user.user_id, author.id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, author_id = author.id, "failed to follow");
                AppError::internal("failed to follow")
            })?;
        if follow.is_some() {
            tracing::info!(user_id = user.user_id, author_id = author.id, "followed");
        }
    }

    Ok(found(&profile_url(&author.username)))
}

pub async fn profile_unfollow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = load_user(&state, &username).await?;

    let removed = SocialService::new(state.db.clone())
        .unfollow(user.user_id, author.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = author.id, "failed to unfollow");
            AppError::internal("failed to unfollow")
        })?;
    if removed {
        tracing::info!(user_id = user.user_id, author_id = author.id, "unfollowed");
    }

    Ok(found(&profile_url(&author.username)))
}

pub async fn about_author(
    user: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let context = page_context(&state, user.as_ref());
    state.templates.render("about/author.html", &context)
}

pub async fn about_tech(
    user: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let context = page_context(&state, user.as_ref());
    state.templates.render("about/tech.html", &context)
}

pub async fn login_form(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, AppError> {
    let form = LoginForm {
        next: query.next,
        ..Default::default()
    };
    render_login(&state, user.as_ref(), &form, &FormErrors::default())
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if let Err(errors) = form.validate() {
        return Ok(render_login(&state, None, &form, &errors)?.into_response());
    }

    let service = auth_service(&state);
    let token = service
        .login(form.username.trim(), &form.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    let Some(token) = token else {
        let mut errors = FormErrors::default();
        errors.add("non_field", INVALID_LOGIN);
        return Ok(render_login(&state, None, &form, &errors)?.into_response());
    };

    let jar = jar.add(session_cookie(
        token,
        service.access_ttl_minutes(),
        state.secure_cookies,
    ));
    Ok((jar, found(safe_next(form.next.as_deref()))).into_response())
}

pub async fn signup_form(
    user: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    render_signup(&state, user.as_ref(), &SignupForm::default(), &FormErrors::default())
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return Ok(render_signup(&state, None, &form, &errors)?.into_response()),
    };

    let service = auth_service(&state);
    let created = service
        .signup(&valid.username, &valid.email, &valid.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create user");
            AppError::internal("failed to create user")
        })?;

    let Some(created) = created else {
        let mut errors = FormErrors::default();
        errors.add("username", "A user with that username already exists.");
        return Ok(render_signup(&state, None, &form, &errors)?.into_response());
    };

    let token = service.issue_access_token(created.id).map_err(|err| {
        tracing::error!(error = ?err, user_id = created.id, "failed to issue session");
        AppError::internal("failed to create user")
    })?;

    tracing::info!(user_id = created.id, "user signed up");
    let jar = jar.add(session_cookie(
        token,
        service.access_ttl_minutes(),
        state.secure_cookies,
    ));
    Ok((jar, found("/")).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>), AppError> {
    let jar = jar.remove(expired_session_cookie());
    let context = page_context(&state, None);
    let page = state.templates.render("auth/logged_out.html", &context)?;
    Ok((jar, page))
}

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
}

pub async fn admin_create_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    let title = payload.title.trim();
    if title.is_empty() || title.chars().count() > GROUP_TITLE_MAX_LEN {
        return Err(AppError::bad_request(
            "title must be between 1 and 200 characters",
        ));
    }
    if !is_valid_slug(&payload.slug) {
        return Err(AppError::bad_request(
            "slug may contain only letters, numbers, hyphens and underscores",
        ));
    }

    let group = GroupService::new(state.db.clone())
        .create(title, payload.description.trim(), &payload.slug)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create group");
            AppError::internal("failed to create group")
        })?
        .ok_or_else(|| AppError::conflict("slug already taken"))?;

    tracing::info!(group_id = group.id, slug = %group.slug, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn admin_delete_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = GroupService::new(state.db.clone())
        .delete_by_slug(&slug)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, slug = %slug, "failed to delete group");
            AppError::internal("failed to delete group")
        })?;

    if !deleted {
        return Err(AppError::not_found("group not found"));
    }
    tracing::info!(slug = %slug, "group deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn admin_delete_user(
    _admin: AdminToken,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = UserService::new(state.db.clone())
        .delete_by_username(&username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to delete user");
            AppError::internal("failed to delete user")
        })?;

    if !deleted {
        return Err(AppError::not_found("user not found"));
    }
    tracing::info!(username = %username, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn page_not_found() -> AppError {
    AppError::not_found("page not found")
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    )
}

async fn load_post(state: &AppState, username: &str, raw_post_id: &str) -> Result<Post, AppError> {
    let post_id = parse_post_id(raw_post_id)?;
    PostService::new(state.db.clone())
        .get_post(username, post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to load post");
            AppError::internal("failed to load post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))
}

async fn load_user(state: &AppState, username: &str) -> Result<crate::domain::user::User, AppError> {
    UserService::new(state.db.clone())
        .get_by_username(username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to load user");
            AppError::internal("failed to load user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))
}

async fn list_groups(state: &AppState) -> Result<Vec<Group>, AppError> {
    GroupService::new(state.db.clone())
        .list()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list groups");
            AppError::internal("failed to load groups")
        })
}

async fn is_following(
    state: &AppState,
    viewer: Option<&AuthUser>,
    author_id: i64,
) -> Result<bool, AppError> {
    let Some(viewer) = viewer else {
        return Ok(false);
    };
    SocialService::new(state.db.clone())
        .is_following(viewer.user_id, author_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id, "failed to check follow");
            AppError::internal("failed to load follow state")
        })
}

async fn store_image(state: &AppState, image: &ValidImage) -> Result<String, AppError> {
    let key = image.storage_key();
    state
        .storage
        .save(&key, image.bytes.clone(), &image.content_type)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, key = %key, "failed to store image");
            AppError::internal("failed to store image")
        })?;
    Ok(key)
}

fn render_post_form(
    state: &AppState,
    user: &AuthUser,
    form: &PostFormValues,
    errors: &FormErrors,
    groups: &[Group],
    post: Option<&Post>,
) -> Result<Response, AppError> {
    let mut context = page_context(state, Some(user));
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("groups", groups);
    context.insert("post", &post);
    context.insert("is_edit", &post.is_some());
    Ok(state.templates.render("posts/new.html", &context)?.into_response())
}

fn render_login(
    state: &AppState,
    user: Option<&AuthUser>,
    form: &LoginForm,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut context = page_context(state, user);
    context.insert("form", form);
    context.insert("errors", errors);
    state.templates.render("auth/login.html", &context)
}

fn render_signup(
    state: &AppState,
    user: Option<&AuthUser>,
    form: &SignupForm,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut context = page_context(state, user);
    context.insert("form", form);
    context.insert("errors", errors);
    state.templates.render("auth/signup.html", &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_ids_are_plain_digits() {
        assert_eq!(parse_post_id("42").unwrap(), 42);
        assert_eq!(parse_post_id("abc").unwrap_err().status(), StatusCode::NOT_FOUND);
        assert_eq!(parse_post_id("-1").unwrap_err().status(), StatusCode::NOT_FOUND);
        assert_eq!(parse_post_id("").unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn urls_encode_usernames() {
        assert_eq!(profile_url("leo"), "/leo/");
        assert_eq!(post_url("leo", 3), "/leo/3/");
        assert_eq!(profile_url("a+b@c"), "/a%2Bb%40c/");
    }
}
