//! Router construction

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers;
use crate::middleware::auth::AuthLayer;
use crate::AppState;

/// Build the application router with auth, tracing, and CORS layers.
pub fn create_router(state: Arc<AppState>) -> Router {
    let auth = AuthLayer::new(
        state.settings.auth.enabled,
        state.settings.auth.api_keys.clone(),
    );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/generate", post(handlers::generate))
        .route("/v1/edit", post(handlers::edit))
        .route("/v1/compose", post(handlers::compose))
        .route(
            "/conversations",
            post(handlers::create_conversation).get(handlers::list_conversations),
        )
        .route(
            "/conversations/:id",
            patch(handlers::rename_conversation).delete(handlers::delete_conversation),
        )
        .route("/conversations/:id/messages", get(handlers::list_messages))
        .layer(auth)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
