//! rusty-blog/crates/api-adapters/src/lib.rs
//!
//! HTTP surface of the blog. The axum router lives behind the `web-axum`
//! feature; pipeline counters are framework independent.

pub mod metrics;
#[cfg(feature = "web-axum")]
pub mod http;

pub use metrics::{Metrics, Outcome};
#[cfg(feature = "web-axum")]
pub use http::{router, AppState};
