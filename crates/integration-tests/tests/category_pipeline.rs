use domains::models::{Category, Lifecycle, Role};
use domains::ports::CategoryRepository;
use domains::{AppError, ValidationError};
use integration_tests::{article_payload, category_payload, TestApp};

#[tokio::test]
async fn deleted_category_keeps_stale_references_but_blocks_new_ones() {
    let app = TestApp::new();
    let admin = app.principal(&[Role::Admin]).await;
    let category = app.services.categories.create(&admin, &category_payload("Travel")).await.unwrap();
    let ids = vec![category.id.to_string()];
    let article = app
        .services
        .articles
        .create(&admin, &article_payload("Lisbon", &ids))
        .await
        .unwrap();

    let deleted = app.services.categories.delete(&admin, "travel").await.unwrap();
    assert_eq!(deleted.state, Lifecycle::Deleted);
    assert!(deleted.title.starts_with(Category::DELETED_TITLE));
    assert!(deleted.slug.starts_with("deleted-"));
    assert_eq!(deleted.description.as_deref(), Some(Category::DELETED_DESCRIPTION));

    let stale = app.services.articles.get(&article.slug).await.unwrap();
    assert_eq!(stale.article.categories, vec![category.id]);

    let err = app
        .services
        .articles
        .create(&admin, &article_payload("Porto", &ids))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ref e) if e == &vec![ValidationError::UnknownCategories]
    ));
}

#[tokio::test]
async fn deleted_category_is_hidden_and_its_slug_is_free_again() {
    let app = TestApp::new();
    let admin = app.principal(&[Role::Admin]).await;
    app.services.categories.create(&admin, &category_payload("Food")).await.unwrap();
    app.services.categories.delete(&admin, "food").await.unwrap();

    assert!(matches!(app.services.categories.get("food").await, Err(AppError::NotFound(_))));
    assert!(matches!(app.services.categories.list().await, Err(AppError::NotFound(_))));

    let again = app.services.categories.create(&admin, &category_payload("Food")).await.unwrap();
    assert_eq!(again.slug, "food");
    let stored = app.store.find_by_slug("food").await.unwrap().unwrap();
    assert_eq!(stored.id, again.id);
}

#[tokio::test]
async fn duplicate_title_is_taken() {
    let app = TestApp::new();
    let admin = app.principal(&[Role::Admin]).await;
    app.services.categories.create(&admin, &category_payload("Music")).await.unwrap();

    let err = app
        .services
        .categories
        .create(&admin, &category_payload("Music"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ref e) if e == &vec![ValidationError::AlreadyTaken { field: "title".to_string() }]
    ));
}

#[tokio::test]
async fn listing_is_sorted_by_title() {
    let app = TestApp::new();
    let admin = app.principal(&[Role::Admin]).await;
    for title in ["Zebra", "Apple", "Mango"] {
        app.services.categories.create(&admin, &category_payload(title)).await.unwrap();
    }

    let titles: Vec<_> = app
        .services
        .categories
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.title)
        .collect();
    assert_eq!(titles, vec!["Apple", "Mango", "Zebra"]);
}

#[tokio::test]
async fn authors_cannot_touch_categories() {
    let app = TestApp::new();
    let author = app.principal(&[Role::Author]).await;
    let err = app
        .services
        .categories
        .create(&author, &category_payload("Sneaky"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}
