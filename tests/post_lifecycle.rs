// End-to-end lifecycle of a post across both stores: create with images,
// like, comment with a reply, then delete and verify the cascade.

use std::sync::Arc;

use bytes::Bytes;
use photolog::archive::ArchiveService;
use photolog::db;
use photolog::error::AppError;
use photolog::posts::{CreatePost, NewImage, PostService};
use photolog::social::SocialService;
use photolog::state::DbPool;
use photolog::store::FsAssetStore;
use tempfile::TempDir;

struct TestApp {
    posts: PostService,
    social: SocialService,
    archive: ArchiveService,
    pool: DbPool,
    _tmp: TempDir,
}

fn test_app() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let pool = db::create_pool(&tmp.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let conn = pool.get().unwrap();
    conn.execute_batch(
        "INSERT INTO users (id, name, email) VALUES ('alice', 'Alice', 'alice@example.com');
         INSERT INTO users (id, name, email) VALUES ('bob', 'Bob', 'bob@example.com');",
    )
    .unwrap();
    drop(conn);

    let assets = Arc::new(FsAssetStore::new(tmp.path().join("uploads")));
    TestApp {
        posts: PostService::new(pool.clone(), assets),
        social: SocialService::new(pool.clone()),
        archive: ArchiveService::new(pool.clone()),
        pool,
        _tmp: tmp,
    }
}

fn image(data: &'static [u8]) -> NewImage {
    NewImage {
        data: Bytes::from_static(data),
        content_type: "image/jpeg".to_string(),
    }
}

fn new_post(title: &str, images: Vec<NewImage>) -> CreatePost {
    CreatePost {
        title: title.to_string(),
        description: "a day worth keeping".to_string(),
        location: Some("tokyo".to_string()),
        latitude: None,
        longitude: None,
        archived: false,
        images,
    }
}

#[tokio::test]
async fn full_post_lifecycle() {
    let app = test_app();

    // Create with two images
    let post_id = app
        .posts
        .create("alice", new_post("morning walk", vec![image(b"a"), image(b"b")]))
        .await
        .unwrap();

    let detail = app.posts.get(&post_id).unwrap();
    assert_eq!(detail.images.len(), 2);
    assert_eq!(detail.likes_count, 0);
    assert_eq!(detail.comments_count, 0);

    // Like from bob
    assert!(app.social.toggle_like("bob", &post_id).unwrap());
    assert_eq!(app.posts.get(&post_id).unwrap().likes_count, 1);

    // Top-level comment plus one reply
    let c1 = app
        .social
        .add_comment("bob", &post_id, "looks great", None)
        .unwrap();
    let c2 = app
        .social
        .add_comment("alice", &post_id, "thanks!", Some(&c1))
        .unwrap();

    let comments = app.social.list_comments(&post_id).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, c1);
    assert_eq!(comments[0].replies.len(), 1);
    assert_eq!(comments[0].replies[0].id, c2);

    // Delete and verify the cascade took everything with it
    app.posts.delete(&post_id, "alice").await.unwrap();

    assert!(matches!(app.posts.get(&post_id), Err(AppError::NotFound)));

    let conn = app.pool.get().unwrap();
    let comment_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM comments WHERE id IN (?1, ?2)",
            rusqlite::params![c1, c2],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(comment_count, 0);

    let like_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM likes", [], |r| r.get(0))
        .unwrap();
    assert_eq!(like_count, 0);
}

#[tokio::test]
async fn like_toggle_round_trip() {
    let app = test_app();

    let post_id = app
        .posts
        .create("alice", new_post("lake", vec![image(b"x")]))
        .await
        .unwrap();

    assert!(app.social.toggle_like("bob", &post_id).unwrap());
    assert!(!app.social.toggle_like("bob", &post_id).unwrap());

    let conn = app.pool.get().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM likes", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn non_owner_mutations_are_rejected() {
    let app = test_app();

    let post_id = app
        .posts
        .create("alice", new_post("private", vec![image(b"x")]))
        .await
        .unwrap();

    assert!(matches!(
        app.posts.set_archived(&post_id, "bob", true),
        Err(AppError::Unauthorized)
    ));
    assert!(matches!(
        app.posts.delete(&post_id, "bob").await,
        Err(AppError::Unauthorized)
    ));

    // Post untouched
    let detail = app.posts.get(&post_id).unwrap();
    assert!(!detail.archived);
}

#[tokio::test]
async fn archive_stats_follow_post_creation() {
    let app = test_app();

    app.posts
        .create("alice", new_post("today", vec![image(b"x")]))
        .await
        .unwrap();

    let stats = app.archive.stats_by_user("alice").unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].count, 1);

    let year = stats[0].year;
    let posts = app.archive.by_year("alice", year).unwrap();
    assert_eq!(posts.len(), 1);

    // Bob has no posts
    assert!(matches!(
        app.archive.stats_by_user("bob"),
        Err(AppError::NotFound)
    ));
}
