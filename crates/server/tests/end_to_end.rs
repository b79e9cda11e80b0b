mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{test_app, test_app_with, test_config};
use serde_json::{json, Value};
use social_server::router::router;
use tower::ServiceExt;

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn register(app: &Router, username: &str, password: &str) -> (String, String, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let data = &body["data"];
    (
        data["userId"].as_str().unwrap().to_string(),
        data["accessToken"].as_str().unwrap().to_string(),
        data["refreshToken"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_social_scenario_over_http() {
    let test_app = test_app_with(test_config(), None).await;
    let app = router(test_app.state.clone());

    let (status, _) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (u1, _, _) = register(&app, "u1", "p1").await;
    let (u2, u2_access, _) = register(&app, "u2", "p2").await;

    // Login as u1
    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "u1", "password": "p1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "successful");
    let u1_access = body["data"]["accessToken"].as_str().unwrap().to_string();
    let u1_refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

    // u1 follows u2
    let (status, body) = call(&app, Method::POST, "/follow", Some(&u1_access), Some(json!({ "followingId": u2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isMutual"], false);

    // u2 follows back
    let (status, body) = call(&app, Method::POST, "/follow", Some(&u2_access), Some(json!({ "followingId": u1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isMutual"], true);
    assert_eq!(
        test_app.state.graph.follow_edge(&u1, &u2).await.unwrap(),
        Some((true, true))
    );

    // u1 posts, u2 likes twice
    let (status, body) = call(&app, Method::POST, "/posts", Some(&u1_access), Some(json!({ "content": "first post" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = body["data"]["postId"].as_str().unwrap().to_string();

    let like_uri = format!("/{post_id}/like");
    let (_, body) = call(&app, Method::POST, &like_uri, Some(&u2_access), None).await;
    assert_eq!(body["data"]["likeCount"], 1);
    let (status, body) = call(&app, Method::POST, &like_uri, Some(&u2_access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["likeCount"], 0);
    assert_eq!(body["data"]["isActive"], false);

    let (_, body) = call(&app, Method::GET, &format!("/posts/{post_id}"), None, None).await;
    assert_eq!(body["data"]["likeCount"], 0);

    // Counts are visible to an authenticated caller
    let (status, body) = call(&app, Method::GET, &format!("/users/{u1}/follow-counts"), Some(&u2_access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["num_of_followers"], 1);

    // Logout, then the access token no longer works
    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/logout",
        Some(&u1_access),
        Some(json!({ "refreshToken": u1_refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::POST, "/posts", Some(&u1_access), Some(json!({ "content": "again" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "TOKEN_REVOKED");

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "refreshToken": u1_refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_REVOKED");
}

#[tokio::test]
async fn test_auth_errors_over_http() {
    let test_app = test_app_with(test_config(), None).await;
    let app = router(test_app.state.clone());

    register(&app, "alice", "secret").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "password": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");

    let (wrong_status, wrong_body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "nope" })),
    )
    .await;
    let (unknown_status, unknown_body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "nobody", "password": "secret" })),
    )
    .await;
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, unknown_status);
    assert_eq!(wrong_body, unknown_body);

    let (status, body) = call(&app, Method::POST, "/follow", None, Some(json!({ "followingId": "x" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NO_AUTH_TOKEN");

    let (status, body) = call(&app, Method::GET, "/profile", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "MALFORMED_TOKEN");
}

#[tokio::test]
async fn test_self_follow_profile_and_likers_over_http() {
    let test_app = test_app_with(test_config(), None).await;
    let app = router(test_app.state.clone());

    let (me, access, _) = register(&app, "carol", "pw").await;

    let (status, body) = call(&app, Method::POST, "/follow", Some(&access), Some(json!({ "followingId": me }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "SELF_FOLLOW");

    let (status, _) = call(&app, Method::GET, "/profile", Some(&access), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let new_profile = json!({
        "firstname": "Carol",
        "lastname": "Danvers",
        "gender": 1,
        "email": "carol@example.com"
    });
    let (status, _) = call(&app, Method::POST, "/profile", Some(&access), Some(new_profile.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(&app, Method::POST, "/profile", Some(&access), Some(new_profile)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");

    let (status, body) = call(&app, Method::PUT, "/profile", Some(&access), Some(json!({ "phone": "555-0100" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "555-0100");
    assert_eq!(body["data"]["firstname"], "Carol");

    // Friends-only post: guests are refused, the owner is not
    let (_, body) = call(
        &app,
        Method::POST,
        "/posts",
        Some(&access),
        Some(json!({ "content": "close friends", "privacy": "friends" })),
    )
    .await;
    let post_id = body["data"]["postId"].as_str().unwrap().to_string();
    call(&app, Method::POST, &format!("/{post_id}/like"), Some(&access), None).await;

    let (status, body) = call(&app, Method::GET, &format!("/{post_id}/likers"), None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = call(&app, Method::GET, &format!("/{post_id}/likers"), Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["data"][0]["lastname"], "Danvers");
}

#[tokio::test]
async fn test_logout_twice_over_http() {
    let test_app = test_app().await;
    let app = router(test_app.state.clone());
    let (_, access, refresh) = register(&app, "dave", "pw").await;

    for _ in 0..2 {
        let (status, body) = call(
            &app,
            Method::POST,
            "/auth/logout",
            Some(&access),
            Some(json!({ "refreshToken": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "successful");
    }

    let (status, body) = call(&app, Method::GET, "/profile", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_REVOKED");
}

#[tokio::test]
async fn test_logout_with_expired_access_token_over_http() {
    let test_app = test_app().await;
    let app = router(test_app.state.clone());
    let (_, access, refresh) = register(&app, "erin", "pw").await;

    test_app.clock.advance(24 * 60 * 60 + 10);
    let (status, body) = call(&app, Method::GET, "/profile", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_EXPIRED");

    // Both tokens in the body, no Authorization header
    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/logout",
        None,
        Some(json!({ "accessToken": access, "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_REVOKED");
}

#[tokio::test]
async fn test_logout_requires_an_access_token_over_http() {
    let test_app = test_app().await;
    let app = router(test_app.state.clone());
    let (_, _, refresh) = register(&app, "frank", "pw").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/logout",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NO_AUTH_TOKEN");

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/logout",
        None,
        Some(json!({ "accessToken": "garbage", "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "MALFORMED_TOKEN");

    // Nothing was revoked
    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_comments_and_newsfeed_over_http() {
    let test_app = test_app_with(test_config(), None).await;
    let app = router(test_app.state.clone());

    let (author, author_access, _) = register(&app, "grace", "pw").await;
    let (_, reader_access, _) = register(&app, "heidi", "pw").await;

    let (_, body) = call(&app, Method::POST, "/posts", Some(&author_access), Some(json!({ "content": "hello feed" }))).await;
    let post_id = body["data"]["postId"].as_str().unwrap().to_string();
    let comments_uri = format!("/posts/{post_id}/comments");

    let (status, body) = call(&app, Method::POST, &comments_uri, Some(&reader_access), Some(json!({ "content": "first!" }))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let comment_id = body["data"]["commentId"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        Method::POST,
        &comments_uri,
        Some(&author_access),
        Some(json!({ "content": "welcome", "parent": comment_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = call(&app, Method::GET, &format!("/posts/{post_id}"), None, None).await;
    assert_eq!(body["data"]["commentCount"], 2);

    let (status, body) = call(&app, Method::GET, &comments_uri, Some(&reader_access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    // Only the author of a comment may edit it
    let edit = json!({ "commentId": comment_id, "content": "edited" });
    let (status, body) = call(&app, Method::PUT, &comments_uri, Some(&author_access), Some(edit.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    let (status, body) = call(&app, Method::PUT, &comments_uri, Some(&reader_access), Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "edited");

    // The reader sees the post once they follow its author
    let (_, body) = call(&app, Method::GET, "/newsfeed", Some(&reader_access), None).await;
    assert_eq!(body["data"]["total"], 0);
    call(&app, Method::POST, "/follow", Some(&reader_access), Some(json!({ "followingId": author }))).await;
    let (status, body) = call(&app, Method::GET, "/newsfeed?limit=5", Some(&reader_access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["data"][0]["postId"], post_id);
    assert_eq!(body["data"]["data"][0]["commentCount"], 2);
    assert_eq!(body["data"]["data"][0]["liked"], false);

    let (status, body) = call(&app, Method::GET, "/newsfeed", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NO_AUTH_TOKEN");
}
