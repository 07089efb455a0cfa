//! rusty-blog/crates/mail-adapters/src/lib.rs
//!
//! Outbound verification mail. `LogMailer` writes the link to the log and is
//! the default; `HttpMailer` (feature `mail-http`) posts to a JSON relay.

pub mod log;
#[cfg(feature = "mail-http")]
pub mod http;

pub use log::LogMailer;
#[cfg(feature = "mail-http")]
pub use http::HttpMailer;

/// Builds the link a user follows to confirm their email address.
pub fn verification_link(public_base_url: &str, key: &str) -> String {
    format!("{}/security/verify/{}", public_base_url.trim_end_matches('/'), key)
}
