use chrono::{Duration, Utc};
use serde_json::{json, Value};

use domains::models::{Role, User};
use domains::ports::{ProfileRepository, UserRepository};
use domains::AppError;
use integration_tests::TestApp;

fn registration(email: &str) -> Value {
    json!({ "name": "Reader", "email": email, "password": "long enough" })
}

fn credentials(email: &str) -> Value {
    json!({ "email": email, "password": "long enough" })
}

#[tokio::test]
async fn register_verify_authenticate() {
    let app = TestApp::new();
    let registered = app.services.security.register(&registration("reader@blog.test")).await.unwrap();
    app.settle().await;

    let sent = app.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "reader@blog.test");

    let err = app.services.security.authenticate(&credentials("reader@blog.test")).await.unwrap_err();
    assert!(matches!(err, AppError::Rejected(ref m) if m == "email not confirmed"));

    app.services.security.verify(&sent[0].1).await.unwrap();
    let user = app.user(registered.id).await;
    assert!(user.email_verified);
    assert!(user.verification.is_none());
    assert_eq!(user.roles.iter().copied().collect::<Vec<_>>(), vec![Role::User]);

    let token = app.services.security.authenticate(&credentials("reader@blog.test")).await.unwrap();
    let principal = app.services.security.principal_from_token(&token).await.unwrap();
    assert_eq!(principal.id, registered.id);
}

#[tokio::test]
async fn email_is_unique_regardless_of_case() {
    let app = TestApp::new();
    app.services.security.register(&registration("Twice@Blog.test")).await.unwrap();
    let err = app.services.security.register(&registration("twice@blog.test")).await.unwrap_err();
    assert!(matches!(err, AppError::Rejected(ref m) if m == "user already exists"));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = TestApp::new();
    app.services.security.register(&registration("known@blog.test")).await.unwrap();

    let wrong = json!({ "email": "known@blog.test", "password": "not the one" });
    let unknown = credentials("unknown@blog.test");
    for payload in [wrong, unknown] {
        let err = app.services.security.authenticate(&payload).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected(ref m) if m == "invalid credentials"));
    }
}

#[tokio::test]
async fn expired_key_is_replaced_and_resent() {
    let app = TestApp::new();
    let registered = app.services.security.register(&registration("late@blog.test")).await.unwrap();

    let mut user: User = app.user(registered.id).await;
    let mut stale = user.verification.clone().unwrap();
    stale.expires_at = Utc::now() - Duration::minutes(1);
    user.verification = Some(stale.clone());
    UserRepository::replace(app.store.as_ref(), user).await.unwrap();

    let err = app.services.security.verify(&stale.key).await.unwrap_err();
    assert!(matches!(err, AppError::Rejected(ref m) if m == "key expired, new email sent"));

    let fresh = app.user(registered.id).await.verification.unwrap();
    assert_ne!(fresh.key, stale.key);
    assert!(fresh.expires_at > Utc::now());
    app.settle().await;
    assert!(app.outbox.sent().iter().any(|(_, key)| key == &fresh.key));
}

#[tokio::test]
async fn unknown_key_is_not_found() {
    let app = TestApp::new();
    assert!(matches!(app.services.security.verify("nope").await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn resend_issues_a_new_key() {
    let app = TestApp::new();
    let registered = app.services.security.register(&registration("again@blog.test")).await.unwrap();
    let first = app.user(registered.id).await.verification.unwrap().key;

    app.services.security.resend(&json!({ "email": "again@blog.test" })).await.unwrap();
    let second = app.user(registered.id).await.verification.unwrap().key;
    assert_ne!(first, second);

    let err = app.services.security.resend(&json!({ "email": "ghost@blog.test" })).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn self_deletion_anonymizes_and_revokes_tokens() {
    let app = TestApp::new();
    let principal = app.principal(&[Role::User, Role::Author]).await;

    app.services.security.delete_me(&principal).await.unwrap();

    let user = app.user(principal.id).await;
    assert!(user.anonymized);
    assert_eq!(user.name, User::ANONYMIZED_NAME);
    assert!(user.roles.is_empty());
    assert!(ProfileRepository::find_by_user(app.store.as_ref(), principal.id)
        .await
        .unwrap()
        .is_none());

    let err = app
        .services
        .security
        .principal_from_token(&principal.id.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated("unknown principal")));
}

#[tokio::test]
async fn admins_cannot_delete_themselves() {
    let app = TestApp::new();
    let admin = app.principal(&[Role::Admin]).await;
    let err = app.services.security.delete_me(&admin).await.unwrap_err();
    assert!(matches!(err, AppError::Rejected(_)));
    assert!(!app.user(admin.id).await.anonymized);
}
