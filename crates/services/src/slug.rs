//! URL-safe identifiers derived from titles.

use crate::sanitize::sanitize;

const SEPARATOR: char = '-';

/// Lowercases `title`, keeps alphanumerics, and collapses every run of
/// anything else into a single `-`. Leading and trailing separators are
/// trimmed. The result is passed through the sanitizer before use.
///
/// An empty return value means no slug can be derived.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(SEPARATOR);
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    sanitize(&slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_whitespace_collapse() {
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
        assert_eq!(slugify("Rust -- the   Book"), "rust-the-book");
    }

    #[test]
    fn unicode_letters_survive() {
        assert_eq!(slugify("Crème Brûlée"), "crème-brûlée");
    }

    #[test]
    fn all_punctuation_yields_empty() {
        assert_eq!(slugify("!!! ??? ..."), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn slugify_is_deterministic_and_idempotent() {
        let titles = ["A Title", "another: one", "x_y_z", "Déjà vu 2"];
        for title in titles {
            let slug = slugify(title);
            assert_eq!(slug, slugify(title));
            assert_eq!(slugify(&slug), slug);
        }
    }

    #[test]
    fn distinct_titles_can_collide() {
        assert_eq!(slugify("Hello World"), slugify("hello, world!"));
    }
}
