//! Free-text sanitizer.
//!
//! Markup is stripped, stray angle brackets are dropped, and control
//! characters other than newline and tab are removed. The output never
//! contains `<` or `>`, which makes the function idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>?").expect("tag pattern is valid"));

pub fn sanitize(input: &str) -> String {
    let stripped = TAG.replace_all(input, "");
    stripped
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}

/// `true` when sanitizing would change the value.
pub fn is_dirty(input: &str) -> bool {
    sanitize(input) != input
}
