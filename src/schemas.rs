use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::handlers::auth::{LoginRequest, SignupRequest};
use crate::handlers::messages::{CreateMessageRequest, MessageResponse};
use crate::handlers::users::{UpdateProfileRequest, UserProfileResponse, UserResponse};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

/// Error response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::signup,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::get_profile,
        crate::handlers::users::update_profile,
        crate::handlers::users::delete_account,
        crate::handlers::users::get_following,
        crate::handlers::users::get_followers,
        crate::handlers::users::follow_user,
        crate::handlers::users::unfollow_user,
        crate::handlers::messages::create_message,
        crate::handlers::messages::get_message,
        crate::handlers::messages::delete_message,
        crate::handlers::messages::home_timeline,
    ),
    components(
        schemas(
            ApiResponse<UserResponse>,
            ApiResponse<Vec<UserResponse>>,
            ApiResponse<UserProfileResponse>,
            ApiResponse<MessageResponse>,
            ApiResponse<Vec<MessageResponse>>,
            ApiResponse<String>,
            ErrorResponse,
            HealthResponse,
            SignupRequest,
            LoginRequest,
            UpdateProfileRequest,
            CreateMessageRequest,
            UserResponse,
            UserProfileResponse,
            MessageResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Signup, login and logout"),
        (name = "users", description = "User profiles and the follow graph"),
        (name = "messages", description = "Message posting and timelines"),
    ),
    info(
        title = "Warbler API",
        description = "Warbler - a small social backend where users post short messages and follow each other",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
