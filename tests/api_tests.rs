// tests/api_tests.rs

mod common;

use common::{PASSWORD, spawn_app, spawn_app_with_mailer};
use serde_json::{Value, json};
use socialconnect::mailer::MemoryMailer;

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get("/random_path_that_does_not_exist", None).await;

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_validates_username() {
    let app = spawn_app().await;

    let response = app.register("ab").await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app.register("ab_12").await;
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["username"], "ab_12");
    assert_eq!(body["user"]["is_verified"], false);
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn register_rejects_duplicates() {
    let app = spawn_app().await;

    assert_eq!(app.register("dup_user").await.status().as_u16(), 201);
    assert_eq!(app.register("dup_user").await.status().as_u16(), 409);

    // Same email, different username.
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": "other_user",
            "email": "DUP_USER@example.com",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn login_requires_verified_email() {
    let app = spawn_app().await;
    app.register("pending").await;

    let response = app.login("pending").await;
    assert_eq!(response.status().as_u16(), 403);

    assert_eq!(app.verify("pending").await.status().as_u16(), 200);

    let response = app.login("pending").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["type"], "Bearer");
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["email"], "pending@example.com");
}

#[tokio::test]
async fn login_accepts_email_and_rejects_bad_password() {
    let app = spawn_app().await;
    let member = app.member("mail").await;

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({
            "username": format!("{}@example.com", member.username),
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "username": member.username, "password": "wrong password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn verification_token_is_single_use() {
    let app = spawn_app().await;
    app.register("once").await;

    assert_eq!(app.verify("once").await.status().as_u16(), 200);
    assert_eq!(app.verify("once").await.status().as_u16(), 400);

    let response = app.get("/api/auth/verify/not-a-real-token", None).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn failed_verification_mail_rolls_back_registration() {
    let app = spawn_app_with_mailer(MemoryMailer::failing()).await;

    let response = app.register("no_mail").await;
    assert_eq!(response.status().as_u16(), 502);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = $1")
        .bind("no_mail")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = spawn_app().await;
    let member = app.member("reset").await;
    let email = format!("{}@example.com", member.username);

    let response = app
        .client
        .post(app.url("/api/auth/password-reset"))
        .json(&json!({ "email": email }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let token = app.mailer.last_token_for(&email).unwrap();

    let confirm = json!({ "token": token, "password": "brand new secret" });
    let response = app
        .client
        .post(app.url("/api/auth/password-reset/confirm"))
        .json(&confirm)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Token cannot be replayed.
    let response = app
        .client
        .post(app.url("/api/auth/password-reset/confirm"))
        .json(&confirm)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    assert_eq!(app.login(&member.username).await.status().as_u16(), 401);
    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "username": member.username, "password": "brand new secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn password_reset_for_unknown_email_is_silent() {
    let app = spawn_app().await;
    let sent_before = app.mailer.sent().len();

    let response = app
        .client
        .post(app.url("/api/auth/password-reset"))
        .json(&json!({ "email": "nobody@example.com" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(app.mailer.sent().len(), sent_before);
}

#[tokio::test]
async fn change_password_checks_old_password() {
    let app = spawn_app().await;
    let member = app.member("chpw").await;

    let response = app
        .post(
            "/api/auth/change-password",
            &member.token,
            json!({ "old_password": "not it at all", "new_password": "another secret" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post(
            "/api/auth/change-password",
            &member.token,
            json!({ "old_password": PASSWORD, "new_password": "another secret" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(app.login(&member.username).await.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = spawn_app().await;

    let response = app.get("/api/users/me", None).await;
    assert_eq!(response.status().as_u16(), 401);

    let response = app.get("/api/users/me", Some("garbage")).await;
    assert_eq!(response.status().as_u16(), 401);

    // An invalid token is rejected on optional-auth routes too.
    let response = app.get("/api/posts", Some("garbage")).await;
    assert_eq!(response.status().as_u16(), 401);
    let response = app.get("/api/posts", None).await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn profile_email_only_visible_to_owner() {
    let app = spawn_app().await;
    let alice = app.member("alice").await;
    let bob = app.member("bob").await;

    let me: Value = app
        .get("/api/users/me", Some(&alice.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], format!("{}@example.com", alice.username));

    let seen: Value = app
        .get(&format!("/api/users/{}", alice.id), Some(&bob.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(seen["username"], alice.username.as_str());
    assert!(seen.get("email").is_none());
}

#[tokio::test]
async fn update_profile_owner_only() {
    let app = spawn_app().await;
    let alice = app.member("alice").await;
    let bob = app.member("bob").await;

    let response = app
        .patch(
            &format!("/api/users/{}", alice.id),
            &alice.token,
            json!({ "bio": "fish & chips <3", "location": "Lisbon" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["bio"], "fish & chips <3");
    assert_eq!(body["location"], "Lisbon");

    let response = app
        .patch(
            &format!("/api/users/{}", alice.id),
            &bob.token,
            json!({ "bio": "hijacked" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .patch(
            &format!("/api/users/{}", alice.id),
            &alice.token,
            json!({ "username": "x" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn avatar_upload_is_stored_and_served() {
    let app = spawn_app().await;
    let alice = app.member("alice").await;
    let png = vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4];

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(png.clone())
            .file_name("me.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url("/api/users/me/avatar"))
        .bearer_auth(&alice.token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    let avatar_url = body["avatar_url"].as_str().unwrap();
    let path = avatar_url
        .strip_prefix("http://localhost:8000")
        .expect("avatar served under the media base url");
    assert!(path.starts_with(&format!("/media/avatars/{}/", alice.id)));

    let served = app.get(path, None).await;
    assert_eq!(served.status().as_u16(), 200);
    assert_eq!(served.bytes().await.unwrap().to_vec(), png);
}

#[tokio::test]
async fn avatar_upload_rejects_other_formats() {
    let app = spawn_app().await;
    let alice = app.member("alice").await;

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"GIF89a".to_vec())
            .file_name("me.gif")
            .mime_str("image/gif")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url("/api/users/me/avatar"))
        .bearer_auth(&alice.token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn user_directory_filters_by_username() {
    let app = spawn_app().await;
    let alice = app.member("findme").await;
    app.member("other").await;

    let users: Value = app
        .get("/api/users?q=findme", None)
        .await
        .json()
        .await
        .unwrap();
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], alice.id);
}
