use crate::auth::{clear_session, set_session_user};
use crate::handlers::users::UserResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{extract::State, http::StatusCode, response::Json};
use axum_valid::Valid;
use model::entities::user::{self, SignupError};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for creating a new account
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct SignupRequest {
    /// Username (must be unique)
    #[validate(length(min = 1, max = 30))]
    pub username: String,
    /// E-mail address (must be unique)
    #[validate(email)]
    pub email: String,
    /// Password (at least 6 characters)
    #[validate(length(min = 6))]
    pub password: String,
    /// Optional avatar URL
    pub image_url: Option<String>,
}

/// Request body for logging in
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Create a new account and log it in
#[utoipa::path(
    post,
    path = "/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request or username/email taken", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(username = %request.username))]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Valid(Json(request)): Valid<Json<SignupRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), (StatusCode, Json<ErrorResponse>)> {
    debug!("Signing up user with username: {}", request.username);

    let signup_result = user::Entity::signup(
        &state.db,
        &request.username,
        &request.email,
        &request.password,
        request.image_url.clone(),
    )
    .await;

    match signup_result {
        Ok(user_model) => {
            info!(
                "User created successfully with ID: {}, username: {}",
                user_model.id, user_model.username
            );

            if let Err(e) = set_session_user(&session, user_model.id).await {
                error!("Failed to store session for user {}: {}", user_model.id, e);
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Failed to establish session".to_string(),
                        code: "SESSION_ERROR".to_string(),
                        success: false,
                    }),
                ));
            }

            let response = ApiResponse {
                data: UserResponse::from(user_model),
                message: "User created successfully".to_string(),
                success: true,
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(SignupError::EmptyPassword) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Password must not be empty".to_string(),
                code: "INVALID_PASSWORD".to_string(),
                success: false,
            }),
        )),
        Err(SignupError::Hash(e)) => {
            error!("Failed to hash password for '{}': {}", request.username, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error while creating user".to_string(),
                    code: "PASSWORD_HASH_ERROR".to_string(),
                    success: false,
                }),
            ))
        }
        Err(SignupError::Db(db_error)) => {
            error!("Failed to create user '{}': {}", request.username, db_error);

            // Check for unique constraint violations
            let error_msg = db_error.to_string().to_lowercase();
            if error_msg.contains("unique") || error_msg.contains("duplicate") {
                let error_response = if error_msg.contains("email") {
                    ErrorResponse {
                        error: format!("Email '{}' is already taken", request.email),
                        code: "EMAIL_ALREADY_EXISTS".to_string(),
                        success: false,
                    }
                } else {
                    ErrorResponse {
                        error: format!("Username '{}' is already taken", request.username),
                        code: "USERNAME_ALREADY_EXISTS".to_string(),
                        success: false,
                    }
                };
                Err((StatusCode::BAD_REQUEST, Json(error_response)))
            } else {
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Internal server error while creating user".to_string(),
                        code: "DATABASE_ERROR".to_string(),
                        success: false,
                    }),
                ))
            }
        }
    }
}

/// Log an existing user in
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<UserResponse>),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Login attempt for username: {}", request.username);

    match user::Entity::authenticate(&state.db, &request.username, &request.password).await {
        Ok(Some(user_model)) => {
            if let Err(e) = set_session_user(&session, user_model.id).await {
                error!("Failed to store session for user {}: {}", user_model.id, e);
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Failed to establish session".to_string(),
                        code: "SESSION_ERROR".to_string(),
                        success: false,
                    }),
                ));
            }

            info!("User {} logged in", user_model.username);
            Ok(Json(ApiResponse {
                data: UserResponse::from(user_model),
                message: "Login successful".to_string(),
                success: true,
            }))
        }
        Ok(None) => {
            warn!("Failed login attempt for username: {}", request.username);
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid username or password".to_string(),
                    code: "INVALID_CREDENTIALS".to_string(),
                    success: false,
                }),
            ))
        }
        Err(db_error) => {
            error!("Database error during login: {}", db_error);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error during login".to_string(),
                    code: "DATABASE_ERROR".to_string(),
                    success: false,
                }),
            ))
        }
    }
}

/// Log the current user out
#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful", body = ApiResponse<String>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn logout(
    session: Session,
) -> Result<Json<ApiResponse<String>>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(e) = clear_session(&session).await {
        error!("Failed to clear session: {}", e);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Failed to clear session".to_string(),
                code: "SESSION_ERROR".to_string(),
                success: false,
            }),
        ));
    }

    Ok(Json(ApiResponse {
        data: "Logged out".to_string(),
        message: "Logout successful".to_string(),
        success: true,
    }))
}
