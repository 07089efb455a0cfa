//! rusty-blog/crates/auth-adapters/src/lib.rs
//!
//! Password hashing (Argon2id) and bearer tokens (JWT, feature `auth-jwt`).

pub mod password;
#[cfg(feature = "auth-jwt")]
pub mod jwt;

pub use password::Argon2Hasher;
#[cfg(feature = "auth-jwt")]
pub use jwt::JwtIssuer;
