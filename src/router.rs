use crate::handlers::{
    auth::{login, logout, signup},
    health::health_check,
    messages::{create_message, delete_message, get_message, home_timeline},
    users::{
        delete_account, follow_user, get_followers, get_following, get_profile, get_user,
        list_users, unfollow_user, update_profile,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tower_sessions::{MemoryStore, SessionManagerLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store).with_secure(false);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Authentication
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        // Users and the follow graph
        .route("/users", get(list_users))
        .route("/users/profile", get(get_profile))
        .route("/users/profile", post(update_profile))
        .route("/users/delete", post(delete_account))
        .route("/users/follow/:user_id", post(follow_user))
        .route("/users/stop-following/:user_id", post(unfollow_user))
        .route("/users/:user_id", get(get_user))
        .route("/users/:user_id/following", get(get_following))
        .route("/users/:user_id/followers", get(get_followers))
        // Messages
        .route("/messages/new", post(create_message))
        .route("/messages/:message_id", get(get_message))
        .route("/messages/:message_id/delete", post(delete_message))
        // Home timeline
        .route("/home", get(home_timeline))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive())
                .layer(session_layer),
        )
        .with_state(state)
}
