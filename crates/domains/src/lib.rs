//! rusty-blog/crates/domains/src/lib.rs
//!
//! The central domain model and interface definitions for rusty-blog.

pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;

    fn sample_comment() -> Comment {
        let created = Utc::now() - Duration::hours(1);
        Comment {
            id: CommentId::new(),
            article: ArticleId::new(),
            author: UserId::new(),
            text: "first".to_string(),
            revisions: Vec::new(),
            state: Lifecycle::Active,
            likes: BTreeSet::new(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn role_parses_both_spellings() {
        assert_eq!("AUTHOR".parse::<Role>().unwrap(), Role::Author);
        assert_eq!("ROLE_ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("EDITOR".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_as_bare_tag() {
        assert_eq!(serde_json::to_string(&Role::Author).unwrap(), "\"AUTHOR\"");
    }

    #[test]
    fn revise_keeps_previous_text_and_its_timestamp() {
        let mut comment = sample_comment();
        let before = comment.updated_at;
        let now = Utc::now();

        comment.revise("second".to_string(), now);

        assert_eq!(comment.text, "second");
        assert_eq!(comment.revisions.len(), 1);
        assert_eq!(comment.revisions[0].text, "first");
        assert_eq!(comment.revisions[0].modified_at, before);
        assert_eq!(comment.updated_at, now);
    }

    #[test]
    fn soft_deleted_comment_keeps_history() {
        let mut comment = sample_comment();
        comment.revise("second".to_string(), Utc::now());
        comment.soft_delete(Utc::now());

        assert!(comment.state.is_deleted());
        assert_eq!(comment.text, Comment::DELETED_TEXT);
        let texts: Vec<_> = comment.revisions.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn soft_deleted_category_gets_fresh_placeholder_slug() {
        let now = Utc::now();
        let mut category = Category {
            id: CategoryId::new(),
            title: "Rust".to_string(),
            slug: "rust".to_string(),
            description: None,
            state: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        };

        category.soft_delete(now);

        assert!(category.state.is_deleted());
        assert!(category.slug.starts_with("deleted-"));
        assert!(category.title.starts_with(Category::DELETED_TITLE));
        assert_eq!(category.description.as_deref(), Some(Category::DELETED_DESCRIPTION));
    }

    #[test]
    fn first_bans_use_requested_duration() {
        let now = Utc::now();
        let next = BanState::default().escalated(30, now);
        assert_eq!(next.ban_count, 1);
        assert_eq!(next.banned_until, Some(now + Duration::minutes(30)));
    }

    #[test]
    fn third_ban_is_permanent() {
        let current = BanState {
            banned_until: None,
            ban_count: 2,
        };
        let next = current.escalated(5, Utc::now());
        assert_eq!(next.ban_count, 3);
        assert_eq!(next.banned_until, Some(BanState::permanent_expiry()));
    }

    #[test]
    fn page_defaults_and_clamps() {
        let page = Page::new(Some(0), Some(1000));
        assert_eq!(page.number, 1);
        assert_eq!(page.size, Page::MAX_SIZE);
        assert_eq!(Page::new(Some(3), None).offset(), 20);
    }

    #[test]
    fn empty_description_in_patch_clears_it() {
        let now = Utc::now();
        let mut article = Article {
            id: ArticleId::new(),
            owner: UserId::new(),
            title: "Title".to_string(),
            slug: "title".to_string(),
            description: Some("old".to_string()),
            blocks: Vec::new(),
            categories: Vec::new(),
            likes: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        let patch = ArticlePatch {
            description: Some(String::new()),
            ..ArticlePatch::default()
        };

        patch.apply(&mut article, now);
        assert_eq!(article.description, None);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(ArticlePatch::default().is_empty());
        let patch = ArticlePatch {
            description: Some("new".to_string()),
            ..ArticlePatch::default()
        };
        assert!(!patch.is_empty());
    }
}
