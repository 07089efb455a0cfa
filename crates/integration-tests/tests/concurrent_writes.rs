use chrono::Utc;
use serde_json::json;

use domains::models::{BanState, Comment, Role};
use domains::ports::{CategoryRepository, CommentRepository};
use domains::AppError;
use integration_tests::{article_payload, category_payload, TestApp};

#[tokio::test]
async fn stale_comment_revision_cannot_resurrect_a_deleted_comment() {
    let app = TestApp::new();
    let author = app.principal(&[Role::Author]).await;
    let slug = app
        .services
        .articles
        .create(&author, &article_payload("Threaded", &[]))
        .await
        .unwrap()
        .slug;
    let created = app
        .services
        .comments
        .create(&author, &json!({ "article": slug, "text": "one" }))
        .await
        .unwrap();

    // An edit read the comment, then a delete committed first.
    let mut stale = CommentRepository::find_by_id(app.store.as_ref(), created.id)
        .await
        .unwrap()
        .unwrap();
    let prior = stale.updated_at;
    app.services
        .comments
        .delete(&author, &created.id.to_string())
        .await
        .unwrap();

    stale.revise("two".to_string(), Utc::now());
    assert!(!app.store.save_revision(stale, prior).await.unwrap());

    let stored = CommentRepository::find_by_id(app.store.as_ref(), created.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.state.is_deleted());
    assert_eq!(stored.text, Comment::DELETED_TEXT);
    let history: Vec<_> = stored.revisions.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(history, ["one"]);
    assert!(matches!(
        app.services.comments.get(&created.id.to_string()).await,
        Err(AppError::NotFound("comment"))
    ));
}

#[tokio::test]
async fn stale_category_copy_cannot_undo_a_delete() {
    let app = TestApp::new();
    let admin = app.principal(&[Role::Admin]).await;
    app.services
        .categories
        .create(&admin, &category_payload("Rust"))
        .await
        .unwrap();

    let mut stale = CategoryRepository::find_by_slug(app.store.as_ref(), "rust")
        .await
        .unwrap()
        .unwrap();
    app.services.categories.delete(&admin, "rust").await.unwrap();

    stale.description = Some("edited meanwhile".to_string());
    assert!(!CategoryRepository::replace(app.store.as_ref(), stale)
        .await
        .unwrap());

    assert!(matches!(
        app.services.categories.get("rust").await,
        Err(AppError::NotFound("category"))
    ));
    assert!(matches!(
        app.services.categories.list().await,
        Err(AppError::NotFound("categories"))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bans_reach_the_permanent_tier() {
    let app = TestApp::new();
    let admin = app.principal(&[Role::Admin]).await;
    let offender = app.principal(&[Role::User]).await;

    let mut handles = Vec::new();
    for _ in 0..3 {
        let services = app.services.clone();
        let admin = admin.clone();
        let target = offender.id.to_string();
        handles.push(tokio::spawn(async move {
            services.admin.ban(&admin, &target, "5").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let ban = app.user(offender.id).await.ban;
    assert_eq!(ban.ban_count, 3);
    assert_eq!(ban.banned_until, Some(BanState::permanent_expiry()));
}
