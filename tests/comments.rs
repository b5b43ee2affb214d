mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn signed_in_user_comments_on_post() {
    let app = common::spawn().await;
    let author = app.create_user("leo").await;
    let reader = app.create_user("anna").await;
    let post = app.create_post(&author, "Discuss me", None).await;
    let path = format!("/leo/{}/comment/", post.id);

    let res = app
        .post_form(&path, &[("text", "First comment")], Some(&reader.session))
        .await;
    res.assert_redirect(&format!("/leo/{}/", post.id));
    assert_eq!(app.comment_count().await, 1);

    app.post_form(&path, &[("text", "Second comment")], Some(&author.session))
        .await
        .assert_redirect(&format!("/leo/{}/", post.id));

    let page = app.get(&format!("/leo/{}/", post.id), None).await.text();
    let first = page.find("First comment").expect("first comment shown");
    let second = page.find("Second comment").expect("second comment shown");
    assert!(first < second, "comments are listed oldest first");
    assert!(page.contains("Comments: 2"));
}

#[tokio::test]
async fn guest_comment_redirects_to_login() {
    let app = common::spawn().await;
    let author = app.create_user("leo").await;
    let post = app.create_post(&author, "Discuss me", None).await;
    let path = format!("/leo/{}/comment/", post.id);

    let res = app.post_form(&path, &[("text", "Anonymous")], None).await;
    res.assert_redirect(&format!("/auth/login/?next={}", path));
    assert_eq!(app.comment_count().await, 0);
}

#[tokio::test]
async fn empty_comment_is_dropped_silently() {
    let app = common::spawn().await;
    let author = app.create_user("leo").await;
    let post = app.create_post(&author, "Discuss me", None).await;

    let res = app
        .post_form(
            &format!("/leo/{}/comment/", post.id),
            &[("text", "   ")],
            Some(&author.session),
        )
        .await;
    res.assert_redirect(&format!("/leo/{}/", post.id));
    assert_eq!(app.comment_count().await, 0);
}

#[tokio::test]
async fn comment_on_missing_post_is_not_found() {
    let app = common::spawn().await;
    let author = app.create_user("leo").await;

    let res = app
        .post_form("/leo/77/comment/", &[("text", "Hello?")], Some(&author.session))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let other = app.create_user("anna").await;
    let post = app.create_post(&other, "Anna's post", None).await;
    let res = app
        .post_form(
            &format!("/leo/{}/comment/", post.id),
            &[("text", "Wrong author in path")],
            Some(&author.session),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(app.comment_count().await, 0);
}

#[tokio::test]
async fn opening_comment_url_returns_to_post() {
    let app = common::spawn().await;
    let author = app.create_user("leo").await;
    let post = app.create_post(&author, "Discuss me", None).await;
    let path = format!("/leo/{}/comment/", post.id);

    app.get(&path, Some(&author.session))
        .await
        .assert_redirect(&format!("/leo/{}/", post.id));
    app.get(&path, None)
        .await
        .assert_redirect(&format!("/auth/login/?next={}", path));
    assert_eq!(app.comment_count().await, 0);
}
