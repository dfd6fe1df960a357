// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use socialconnect::{
    config::Config, db, mailer::MemoryMailer, routes, state::AppState,
    storage::LocalObjectStorage,
};
use sqlx::SqlitePool;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub mailer: MemoryMailer,
    pub pool: SqlitePool,
}

/// Spawns the app on a random port, backed by a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_mailer(MemoryMailer::default()).await
}

pub async fn spawn_app_with_mailer(mailer: MemoryMailer) -> TestApp {
    let mut config = Config::for_tests("test_secret_for_integration_tests");
    config.admin_username = Some("root_admin".to_string());
    config.admin_email = Some("root@example.com".to_string());
    config.admin_password = Some(PASSWORD.to_string());

    let pool = db::connect(&config.database_url)
        .await
        .expect("Failed to open in-memory database");
    socialconnect::services::accounts::seed_admin(&pool, &config)
        .await
        .expect("Failed to seed admin");

    let upload_dir = std::env::temp_dir().join(format!("sc-uploads-{}", uuid::Uuid::new_v4()));
    config.upload_dir = upload_dir.to_string_lossy().into_owned();

    let state = AppState {
        pool: pool.clone(),
        mailer: Arc::new(mailer.clone()),
        storage: Arc::new(LocalObjectStorage::new(
            &config.upload_dir,
            &config.media_base_url,
        )),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        mailer,
        pool,
    }
}

/// A logged-in account.
pub struct Member {
    pub id: i64,
    pub username: String,
    pub token: String,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn verify(&self, username: &str) -> reqwest::Response {
        let token = self
            .mailer
            .last_token_for(&format!("{}@example.com", username))
            .expect("No verification mail sent");
        self.client
            .get(self.url(&format!("/api/auth/verify/{}", token)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login_member(&self, username: &str) -> Member {
        let response = self.login(username).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        Member {
            id: body["user"]["id"].as_i64().unwrap(),
            username: username.to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Registers, verifies and logs in a fresh account.
    pub async fn member(&self, prefix: &str) -> Member {
        let username = format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8]);
        assert_eq!(self.register(&username).await.status().as_u16(), 201);
        assert_eq!(self.verify(&username).await.status().as_u16(), 200);
        self.login_member(&username).await
    }

    pub async fn admin(&self) -> Member {
        self.login_member("root_admin").await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn create_post(&self, author: &Member, content: &str) -> i64 {
        let response = self
            .post("/api/posts", &author.token, json!({ "content": content }))
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn set_privacy(&self, member: &Member, privacy: &str) {
        let response = self
            .patch(
                &format!("/api/users/{}", member.id),
                &member.token,
                json!({ "privacy": privacy }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }
}
