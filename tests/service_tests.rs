// tests/service_tests.rs

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use socialconnect::{
    config::Config,
    db,
    error::AppError,
    mailer::{Mailer, MemoryMailer},
    models::{
        comment::CreateCommentRequest,
        post::CreatePostRequest,
        user::{Privacy, RegisterRequest, UserListParams},
    },
    policy::Viewer,
    services::{
        accounts, follows, interactions, notifications, posts,
        tokens::{self, TokenPurpose},
    },
    state::AppState,
    storage::LocalObjectStorage,
};
use sqlx::SqlitePool;

async fn pool() -> SqlitePool {
    db::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database")
}

/// A WAL database file with a real multi-connection pool.
async fn file_pool() -> SqlitePool {
    let path = std::env::temp_dir().join(format!("sc-{}.db", uuid::Uuid::new_v4()));
    db::connect(&format!("sqlite://{}", path.display()))
        .await
        .expect("Failed to open database file")
}

fn state(pool: SqlitePool, mailer: Arc<dyn Mailer>) -> AppState {
    let config = Config::for_tests("service_tests_secret");
    AppState {
        pool,
        mailer,
        storage: Arc::new(LocalObjectStorage::new(
            &config.upload_dir,
            &config.media_base_url,
        )),
        config,
    }
}

/// Accepts every message after a delay.
struct SlowMailer(Duration);

#[async_trait]
impl Mailer for SlowMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), AppError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// Inserts a verified, active account without going through registration.
async fn account(pool: &SqlitePool, username: &str, privacy: Privacy) -> Viewer {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, email, password, privacy, is_active, is_verified, is_staff, created_at)
        VALUES ($1, $2, 'x', $3, TRUE, TRUE, FALSE, $4)
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(format!("{}@example.com", username))
    .bind(privacy)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .unwrap();

    Viewer {
        id,
        is_staff: false,
    }
}

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}

fn post_request(content: &str) -> CreatePostRequest {
    CreatePostRequest {
        content: content.to_string(),
        category: Default::default(),
        image_url: None,
    }
}

async fn post(pool: &SqlitePool, author: &Viewer) -> i64 {
    posts::create_post(pool, author, &post_request("hello"))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn self_follow_leaves_no_state() {
    let pool = pool().await;
    let a = account(&pool, "alice", Privacy::Public).await;

    let err = follows::follow(&pool, &a, a.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM follows").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM notifications").await, 0);
}

#[tokio::test]
async fn double_follow_keeps_one_edge_and_one_notification() {
    let pool = pool().await;
    let a = account(&pool, "alice", Privacy::Public).await;
    let b = account(&pool, "bob", Privacy::Public).await;

    follows::follow(&pool, &a, b.id).await.unwrap();
    let err = follows::follow(&pool, &a, b.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM follows").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM notifications").await, 1);

    follows::unfollow(&pool, &a, b.id).await.unwrap();
    let err = follows::unfollow(&pool, &a, b.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    // Unfollowing sends nothing.
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM notifications").await, 1);
}

#[tokio::test]
async fn rejected_like_leaves_no_state() {
    let pool = pool().await;
    let author = account(&pool, "author", Privacy::Private).await;
    let stranger = account(&pool, "stranger", Privacy::Public).await;
    let post_id = post(&pool, &author).await;

    let err = interactions::like(&pool, &stranger, post_id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM likes").await, 0);
    assert_eq!(count(&pool, "SELECT like_count FROM posts").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM notifications").await, 0);
}

#[tokio::test]
async fn repeated_likes_count_once() {
    let pool = pool().await;
    let author = account(&pool, "author", Privacy::Public).await;
    let fan = account(&pool, "fan", Privacy::Public).await;
    let post_id = post(&pool, &author).await;

    assert_eq!(interactions::like(&pool, &fan, post_id).await.unwrap().like_count, 1);
    for _ in 0..3 {
        assert!(interactions::like(&pool, &fan, post_id).await.is_err());
    }
    assert_eq!(count(&pool, "SELECT like_count FROM posts").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM likes").await, 1);

    assert_eq!(interactions::unlike(&pool, &fan, post_id).await.unwrap().like_count, 0);
    assert!(matches!(
        interactions::unlike(&pool, &fan, post_id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
    assert_eq!(count(&pool, "SELECT like_count FROM posts").await, 0);
}

#[tokio::test]
async fn self_interactions_still_notify() {
    let pool = pool().await;
    let author = account(&pool, "author", Privacy::Public).await;
    let post_id = post(&pool, &author).await;

    interactions::like(&pool, &author, post_id).await.unwrap();
    let req = CreateCommentRequest {
        content: "talking to myself".to_string(),
    };
    interactions::add_comment(&pool, &author, post_id, &req).await.unwrap();

    assert_eq!(notifications::unread_count(&pool, author.id).await.unwrap(), 2);
}

#[tokio::test]
async fn comment_counter_tracks_active_comments() {
    let pool = pool().await;
    let author = account(&pool, "author", Privacy::Public).await;
    let fan = account(&pool, "fan", Privacy::Public).await;
    let post_id = post(&pool, &author).await;
    let req = CreateCommentRequest {
        content: "one".to_string(),
    };

    let first = interactions::add_comment(&pool, &fan, post_id, &req).await.unwrap();
    interactions::add_comment(&pool, &fan, post_id, &req).await.unwrap();
    assert_eq!(count(&pool, "SELECT comment_count FROM posts").await, 2);

    interactions::delete_comment(&pool, &fan, first.id).await.unwrap();
    assert_eq!(count(&pool, "SELECT comment_count FROM posts").await, 1);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM comments WHERE is_active = 1").await,
        1
    );

    // Staff may remove anyone's comment.
    let staff = Viewer {
        id: author.id,
        is_staff: true,
    };
    let remaining = interactions::list_comments(&pool, None, post_id).await.unwrap();
    interactions::delete_comment(&pool, &staff, remaining[0].id).await.unwrap();
    assert_eq!(count(&pool, "SELECT comment_count FROM posts").await, 0);
}

#[tokio::test]
async fn privacy_matrix_for_profiles() {
    let pool = pool().await;
    let owner_public = account(&pool, "pub", Privacy::Public).await;
    let owner_private = account(&pool, "priv", Privacy::Private).await;
    let owner_followers = account(&pool, "fol", Privacy::FollowersOnly).await;
    let follower = account(&pool, "follower", Privacy::Public).await;
    let stranger = account(&pool, "stranger", Privacy::Public).await;

    for target in [&owner_public, &owner_private, &owner_followers] {
        follows::follow(&pool, &follower, target.id).await.unwrap();
    }

    let cases = [
        (&owner_public, Some(&follower), true),
        (&owner_public, Some(&stranger), true),
        (&owner_public, None, true),
        (&owner_private, Some(&follower), false),
        (&owner_private, Some(&stranger), false),
        (&owner_private, None, false),
        (&owner_private, Some(&owner_private), true),
        (&owner_followers, Some(&follower), true),
        (&owner_followers, Some(&stranger), false),
        (&owner_followers, None, false),
    ];

    for (target, viewer, visible) in cases {
        let result = accounts::get_profile(&pool, viewer, target.id).await;
        assert_eq!(
            result.is_ok(),
            visible,
            "target {} viewer {:?}",
            target.id,
            viewer.map(|v| v.id)
        );
    }
}

#[tokio::test]
async fn concurrent_likes_from_different_accounts_all_land() {
    let pool = file_pool().await;
    let author = account(&pool, "author", Privacy::Public).await;
    let post_id = post(&pool, &author).await;

    let mut fans = Vec::new();
    for i in 0..20 {
        fans.push(account(&pool, &format!("fan{}", i), Privacy::Public).await);
    }

    let tasks: Vec<_> = fans
        .into_iter()
        .map(|fan| {
            let pool = pool.clone();
            tokio::spawn(async move { interactions::like(&pool, &fan, post_id).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(count(&pool, "SELECT like_count FROM posts").await, 20);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM likes").await, 20);
    assert_eq!(notifications::unread_count(&pool, author.id).await.unwrap(), 20);
}

#[tokio::test]
async fn concurrent_duplicate_likes_count_once() {
    let pool = file_pool().await;
    let author = account(&pool, "author", Privacy::Public).await;
    let fan = account(&pool, "fan", Privacy::Public).await;
    let post_id = post(&pool, &author).await;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { interactions::like(&pool, &fan, post_id).await })
        })
        .collect();

    let mut liked = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => liked += 1,
            Err(e) => assert!(matches!(e, AppError::Conflict(_)), "{:?}", e),
        }
    }

    assert_eq!(liked, 1);
    assert_eq!(count(&pool, "SELECT like_count FROM posts").await, 1);
}

#[tokio::test]
async fn concurrent_follows_all_land() {
    let pool = file_pool().await;
    let star = account(&pool, "star", Privacy::Public).await;

    let mut tasks = Vec::new();
    for i in 0..15 {
        let fan = account(&pool, &format!("fan{}", i), Privacy::Public).await;
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move { follows::follow(&pool, &fan, star.id).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let profile = accounts::get_profile(&pool, Some(&star), star.id).await.unwrap();
    assert_eq!(profile.followers_count, 15);
}

#[tokio::test]
async fn verification_token_redeems_once_under_contention() {
    let pool = file_pool().await;
    let user = account(&pool, "alice", Privacy::Public).await;

    let mut tx = db::begin_write(&pool).await.unwrap();
    let token = tokens::issue(&mut tx, user.id, TokenPurpose::VerifyEmail, 3600)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let pool = pool.clone();
            let token = token.clone();
            tokio::spawn(async move {
                let mut conn = pool.acquire().await.unwrap();
                tokens::consume(&mut conn, &token, TokenPurpose::VerifyEmail).await
            })
        })
        .collect();

    let mut redeemed = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            redeemed += 1;
        }
    }
    assert_eq!(redeemed, 1);
}

#[tokio::test]
async fn slow_mail_does_not_block_other_writers() {
    let pool = file_pool().await;
    let a = account(&pool, "alice", Privacy::Public).await;
    let b = account(&pool, "bob", Privacy::Public).await;
    let state = state(pool.clone(), Arc::new(SlowMailer(Duration::from_secs(2))));

    let registration = tokio::spawn(async move {
        let req = RegisterRequest {
            username: "carol".to_string(),
            email: "carol@example.com".to_string(),
            password: "password123".to_string(),
        };
        accounts::register(&state, &req).await
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let followed = tokio::time::timeout(Duration::from_secs(1), follows::follow(&pool, &a, b.id))
        .await
        .expect("follow waited on the mail send");
    followed.unwrap();

    registration.await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_mail_leaves_no_account_or_token() {
    let pool = file_pool().await;
    let state = state(pool.clone(), Arc::new(MemoryMailer::failing()));

    let req = RegisterRequest {
        username: "carol".to_string(),
        email: "carol@example.com".to_string(),
        password: "password123".to_string(),
    };
    let err = accounts::register(&state, &req).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM users").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM account_tokens").await, 0);

    account(&pool, "alice", Privacy::Public).await;
    let err = accounts::request_password_reset(&state, "alice@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM account_tokens WHERE used_at IS NULL").await,
        0
    );
}

#[tokio::test]
async fn text_is_stored_as_given_within_bounds() {
    let pool = pool().await;
    let author = account(&pool, "author", Privacy::Public).await;

    let brackets = "<".repeat(280);
    let stored = posts::create_post(&pool, &author, &post_request(&brackets))
        .await
        .unwrap();
    assert_eq!(stored.content, brackets);

    let err = posts::create_post(&pool, &author, &post_request(&"&".repeat(281)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = posts::create_post(&pool, &author, &post_request("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let req = CreateCommentRequest {
        content: "a & b".to_string(),
    };
    let comment = interactions::add_comment(&pool, &author, stored.id, &req)
        .await
        .unwrap();
    assert_eq!(comment.content, "a & b");

    let req = CreateCommentRequest {
        content: "&".repeat(200),
    };
    let comment = interactions::add_comment(&pool, &author, stored.id, &req)
        .await
        .unwrap();
    assert_eq!(comment.content.chars().count(), 200);
}

#[tokio::test]
async fn profile_counts_match_follow_lists() {
    let pool = pool().await;
    let star = account(&pool, "star", Privacy::Public).await;
    let active = account(&pool, "active", Privacy::Public).await;
    let gone = account(&pool, "gone", Privacy::Public).await;

    follows::follow(&pool, &active, star.id).await.unwrap();
    follows::follow(&pool, &gone, star.id).await.unwrap();
    follows::follow(&pool, &star, gone.id).await.unwrap();

    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(gone.id)
        .execute(&pool)
        .await
        .unwrap();

    let profile = accounts::get_profile(&pool, Some(&star), star.id).await.unwrap();
    let followers = follows::list_followers(&pool, Some(&star), star.id).await.unwrap();
    let following = follows::list_following(&pool, Some(&star), star.id).await.unwrap();

    assert_eq!(profile.followers_count, 1);
    assert_eq!(profile.followers_count, followers.len() as i64);
    assert_eq!(profile.following_count, 0);
    assert_eq!(profile.following_count, following.len() as i64);
}

#[tokio::test]
async fn directory_search_matches_wildcards_literally() {
    let pool = pool().await;
    account(&pool, "a_b", Privacy::Public).await;
    account(&pool, "axb", Privacy::Public).await;

    let search = |q: &str| UserListParams {
        q: Some(q.to_string()),
        page: None,
    };

    let found = accounts::list_users(&pool, None, &search("_")).await.unwrap();
    let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["a_b"]);

    let found = accounts::list_users(&pool, None, &search("%")).await.unwrap();
    assert!(found.is_empty());

    let far = UserListParams {
        q: None,
        page: Some(i64::MAX),
    };
    assert!(accounts::list_users(&pool, None, &far).await.unwrap().is_empty());
}
