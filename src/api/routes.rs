use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::require_session;
use crate::gate::classifier::AUTH_SESSION_ROUTE;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Application routes -- every request passes the session gate, which
    // decides from the route table whether a cookie is required
    let v1_routes = Router::new()
        .route(
            AUTH_SESSION_ROUTE,
            get(handlers::get_session)
                .post(handlers::create_session)
                .put(handlers::refresh_session)
                .delete(handlers::delete_session),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_session,
        ));

    // Internal routes -- probes, never gated
    let internal_routes = Router::new().route("/_internal/health", get(handlers::health));

    Router::new()
        .merge(v1_routes)
        .merge(internal_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
