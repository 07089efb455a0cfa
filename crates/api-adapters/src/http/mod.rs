//! axum wiring: shared state, routes and the tower layers around them.

use std::sync::Arc;

use axum::extract::Request;
use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use services::Services;

use crate::metrics::{Metrics, Outcome};

mod extract;
mod handlers;
mod response;

pub use extract::{AuthUser, JsonBody};
pub use response::{ApiError, ApiSuccess};

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Counts the pipeline outcome, then hands the result to the error mapper.
    pub(crate) fn track<T>(
        &self,
        entity: &str,
        action: &str,
        result: domains::Result<T>,
    ) -> Result<T, ApiError> {
        self.metrics.observe(entity, action, Outcome::of(&result));
        result.map_err(ApiError::from)
    }
}

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id,
        )
    });

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .merge(article_routes())
        .merge(category_routes())
        .merge(comment_routes())
        .nest("/security", security_routes())
        .nest("/profile", profile_routes())
        .route("/admin/ban/{id}/{minutes}", get(handlers::admin::ban))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace_layer)
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

fn article_routes() -> Router<AppState> {
    use handlers::articles::*;
    Router::new()
        .route("/articles", get(list).post(create))
        .route("/articles/{slug}", get(read).put(edit).delete(remove))
        .route("/articles/{slug}/like", put(like))
}

fn category_routes() -> Router<AppState> {
    use handlers::categories::*;
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/{slug}", get(read).put(edit).delete(remove))
}

fn comment_routes() -> Router<AppState> {
    use handlers::comments::*;
    Router::new()
        .route("/comments", post(create))
        .route("/comments/{id}", get(read).put(edit).delete(remove))
        .route("/comments/{id}/like", put(like))
}

fn security_routes() -> Router<AppState> {
    use handlers::security::*;
    Router::new()
        .route("/register", post(register))
        .route("/auth", post(authenticate))
        .route("/delete", axum::routing::delete(delete_me))
        .route("/verify/{key}", get(verify))
        .route("/resend", post(resend))
}

fn profile_routes() -> Router<AppState> {
    use handlers::profiles::*;
    Router::new()
        .route("/me", get(me))
        .route("/user/{id}", get(of_user))
        .route("/edit", put(edit_mine))
        .route("/edit/{id}", put(edit_other))
}
