#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use tempfile::TempDir;
use tower::ServiceExt;

use yatube::app::auth::AuthService;
use yatube::app::groups::GroupService;
use yatube::app::posts::PostService;
use yatube::config::AppConfig;
use yatube::domain::group::Group;
use yatube::domain::post::Post;
use yatube::http::SESSION_COOKIE;
use yatube::AppState;

// "0123456789abcdef0123456789abcdef"
const TEST_PASETO_ACCESS_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";
pub const DEFAULT_PASSWORD: &str = "testpassword123";

/// A 2x1 GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

const BOUNDARY: &str = "----yatube-test-boundary";

pub struct TestApp {
    router: Router,
    pub state: AppState,
    media: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).into_owned()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body_bytes
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// The session token set by this response, if any.
    pub fn session(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, value)| value.to_string())
    }

    /// Number of post cards rendered on the page.
    pub fn post_cards(&self) -> usize {
        self.text().matches("data-post-id=").count()
    }

    pub fn assert_redirect(&self, expected: &str) {
        assert_eq!(self.status, StatusCode::FOUND, "body: {}", self.text());
        assert_eq!(self.location(), Some(expected));
    }
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub session: String,
}

/// A fresh application over an in-memory database and a temporary media
/// directory.
pub async fn spawn() -> TestApp {
    spawn_with(&[]).await
}

pub async fn spawn_with(overrides: &[(&str, &str)]) -> TestApp {
    let media = tempfile::tempdir().expect("cannot create media dir");

    let mut vars: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
        (
            "PASETO_ACCESS_KEY".to_string(),
            TEST_PASETO_ACCESS_KEY.to_string(),
        ),
        ("ADMIN_TOKEN".to_string(), TEST_ADMIN_TOKEN.to_string()),
        (
            "MEDIA_ROOT".to_string(),
            media.path().to_string_lossy().into_owned(),
        ),
        ("MEDIA_URL".to_string(), "/media/".to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    let config = AppConfig::from_lookup(|key| vars.get(key).cloned())
        .expect("failed to build AppConfig");
    let state = AppState::from_config(&config)
        .await
        .expect("failed to build AppState");
    let router = yatube::http::router(state.clone());

    TestApp {
        router,
        state,
        media,
    }
}

impl TestApp {
    /// Sends later requests to `router` instead of the full application.
    pub fn mount(&mut self, router: Router) {
        self.router = router;
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Body,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    pub async fn get(&self, path: &str, session: Option<&str>) -> TestResponse {
        let cookie = session.map(session_cookie);
        let mut headers = vec![];
        if let Some(cookie) = &cookie {
            headers.push(("cookie", cookie.as_str()));
        }
        self.request(Method::GET, path, Body::empty(), &headers).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        session: Option<&str>,
    ) -> TestResponse {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let cookie = session.map(session_cookie);
        let mut headers = vec![("content-type", "application/x-www-form-urlencoded")];
        if let Some(cookie) = &cookie {
            headers.push(("cookie", cookie.as_str()));
        }
        self.request(Method::POST, path, Body::from(body), &headers)
            .await
    }

    /// Posts a `multipart/form-data` body, optionally with one `image` file.
    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        image: Option<(&str, &str, &[u8])>,
        session: Option<&str>,
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, content_type, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, filename, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        let cookie = session.map(session_cookie);
        let mut headers = vec![("content-type", content_type.as_str())];
        if let Some(cookie) = &cookie {
            headers.push(("cookie", cookie.as_str()));
        }
        self.request(Method::POST, path, Body::from(body), &headers)
            .await
    }

    pub async fn admin_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        admin_token: Option<&str>,
    ) -> TestResponse {
        let mut headers = vec![];
        if let Some(token) = admin_token {
            headers.push(("x-admin-token", token));
        }
        let body = match body {
            Some(body) => {
                headers.push(("content-type", "application/json"));
                Body::from(serde_json::to_string(&body).unwrap())
            }
            None => Body::empty(),
        };
        self.request(method, path, body, &headers).await
    }

    pub fn media_path(&self) -> &std::path::Path {
        self.media.path()
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.state.db.clone(),
            self.state.paseto_access_key,
            self.state.access_ttl_minutes,
        )
    }

    /// Registers a user and issues a session for them directly.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let service = self.auth_service();
        let user = service
            .signup(username, &format!("{}@example.com", username), DEFAULT_PASSWORD)
            .await
            .expect("signup failed")
            .expect("username already taken");
        let session = service
            .issue_access_token(user.id)
            .expect("failed to issue session");

        TestUser {
            id: user.id,
            username: user.username,
            session,
        }
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> Group {
        GroupService::new(self.state.db.clone())
            .create(title, &format!("Description of {}", title), slug)
            .await
            .expect("create group failed")
            .expect("slug already taken")
    }

    pub async fn create_post(&self, author: &TestUser, text: &str, group: Option<&Group>) -> Post {
        PostService::new(self.state.db.clone())
            .create_post(author.id, text, group.map(|group| group.id), None)
            .await
            .expect("create post failed")
    }

    pub async fn post_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.state.db.pool())
            .await
            .expect("count posts failed")
    }

    pub async fn comment_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(self.state.db.pool())
            .await
            .expect("count comments failed")
    }

    pub async fn follow_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM follows")
            .fetch_one(self.state.db.pool())
            .await
            .expect("count follows failed")
    }
}

fn session_cookie(token: &str) -> String {
    format!("{}={}", SESSION_COOKIE, token)
}
