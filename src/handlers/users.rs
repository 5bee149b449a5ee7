use crate::auth::{clear_session, CurrentUser};
use crate::handlers::messages::MessageResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use model::entities::{follow, message, user};
use model::password;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            bio: model.bio,
            location: model.location,
            image_url: model.image_url,
            header_image_url: model.header_image_url,
        }
    }
}

/// User profile with messages and follow counts
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserProfileResponse {
    pub user: UserResponse,
    /// The user's messages, newest first (capped at 100)
    pub messages: Vec<MessageResponse>,
    pub followers_count: u64,
    pub following_count: u64,
}

/// Request body for editing the current user's profile
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    /// Username (must be unique)
    #[validate(length(min = 1, max = 30))]
    pub username: Option<String>,
    /// E-mail address (must be unique)
    #[validate(email)]
    pub email: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    /// Current password, required to authorize the change
    pub password: String,
}

/// Query parameters for the user listing
#[derive(Debug, Deserialize, ToSchema)]
pub struct UserSearchQuery {
    /// Username substring filter
    pub q: Option<String>,
}

/// List users, optionally filtered by username substring
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(
        ("q" = Option<String>, Query, description = "Username substring filter"),
    ),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(q = ?query.q))]
pub async fn list_users(
    _current_user: CurrentUser,
    Query(query): Query<UserSearchQuery>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, StatusCode> {
    trace!("Entering list_users function");

    let mut finder = user::Entity::find();
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        debug!("Filtering users by username substring: {}", q);
        finder = finder.filter(user::Column::Username.contains(q));
    }

    match finder.all(&state.db).await {
        Ok(users) => {
            let user_count = users.len();
            debug!("Retrieved {} users from database", user_count);

            let user_responses: Vec<UserResponse> =
                users.into_iter().map(UserResponse::from).collect();

            info!("Successfully retrieved {} users", user_count);
            let response = ApiResponse {
                data: user_responses,
                message: "Users retrieved successfully".to_string(),
                success: true,
            };
            Ok(Json(response))
        }
        Err(db_error) => {
            error!("Failed to retrieve users from database: {}", db_error);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Get a user's profile: their fields, messages and follow counts
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserProfileResponse>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(user_id = user_id))]
pub async fn get_user(
    _current_user: CurrentUser,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserProfileResponse>>, StatusCode> {
    trace!("Entering get_user function for user_id: {}", user_id);

    let user_model = match user::Entity::find_by_id(user_id).one(&state.db).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("User with ID {} not found", user_id);
            return Err(StatusCode::NOT_FOUND);
        }
        Err(db_error) => {
            error!("Failed to retrieve user with ID {}: {}", user_id, db_error);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let messages = message::Entity::find()
        .filter(message::Column::UserId.eq(user_id))
        .order_by_desc(message::Column::Timestamp)
        .limit(100)
        .all(&state.db)
        .await
        .map_err(|db_error| {
            error!("Failed to retrieve messages for user {}: {}", user_id, db_error);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let followers_count = follow::Entity::find()
        .filter(follow::Column::UserBeingFollowedId.eq(user_id))
        .count(&state.db)
        .await
        .map_err(|db_error| {
            error!("Failed to count followers for user {}: {}", user_id, db_error);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let following_count = follow::Entity::find()
        .filter(follow::Column::UserFollowingId.eq(user_id))
        .count(&state.db)
        .await
        .map_err(|db_error| {
            error!("Failed to count following for user {}: {}", user_id, db_error);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let username = user_model.username.clone();
    let messages = messages
        .into_iter()
        .map(|m| MessageResponse::from_parts(m, username.clone()))
        .collect();

    info!("Successfully retrieved profile for user {}", user_id);
    let response = ApiResponse {
        data: UserProfileResponse {
            user: UserResponse::from(user_model),
            messages,
            followers_count,
            following_count,
        },
        message: "User retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Get the logged-in user's own profile
#[utoipa::path(
    get,
    path = "/users/profile",
    tag = "users",
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<ApiResponse<UserResponse>> {
    debug!("Retrieving own profile for user {}", user.id);

    Json(ApiResponse {
        data: UserResponse::from(user),
        message: "Profile retrieved successfully".to_string(),
        success: true,
    })
}

/// Edit the logged-in user's profile, authorized by their current password
#[utoipa::path(
    post,
    path = "/users/profile",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request or username/email taken", body = ErrorResponse),
        (status = 401, description = "Not logged in or wrong password", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn update_profile(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<UpdateProfileRequest>>,
) -> Result<Json<ApiResponse<UserResponse>>, (StatusCode, Json<ErrorResponse>)> {
    trace!("Entering update_profile function for user {}", user.id);

    // The change must be authorized with the current password
    match password::verify_password(&request.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!("Profile edit with wrong password for user {}", user.id);
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Wrong password".to_string(),
                    code: "INVALID_PASSWORD".to_string(),
                    success: false,
                }),
            ));
        }
        Err(e) => {
            error!("Failed to verify password for user {}: {}", user.id, e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error while updating profile".to_string(),
                    code: "PASSWORD_HASH_ERROR".to_string(),
                    success: false,
                }),
            ));
        }
    }

    let user_id = user.id;
    let mut user_active: user::ActiveModel = user.into();
    let mut updated_fields = Vec::new();

    // Update only provided fields
    if let Some(username) = request.username {
        user_active.username = Set(username.clone());
        updated_fields.push(format!("username: {}", username));
    }
    if let Some(email) = request.email {
        user_active.email = Set(email.clone());
        updated_fields.push(format!("email: {}", email));
    }
    if let Some(bio) = request.bio {
        user_active.bio = Set(Some(bio));
        updated_fields.push("bio".to_string());
    }
    if let Some(location) = request.location {
        user_active.location = Set(Some(location));
        updated_fields.push("location".to_string());
    }
    if let Some(image_url) = request.image_url {
        user_active.image_url = Set(Some(image_url));
        updated_fields.push("image_url".to_string());
    }
    if let Some(header_image_url) = request.header_image_url {
        user_active.header_image_url = Set(Some(header_image_url));
        updated_fields.push("header_image_url".to_string());
    }

    debug!(
        "Updating fields for user {}: {}",
        user_id,
        if updated_fields.is_empty() {
            "none".to_string()
        } else {
            updated_fields.join(", ")
        }
    );

    match user_active.update(&state.db).await {
        Ok(updated_user) => {
            info!("Profile for user {} updated successfully", user_id);
            Ok(Json(ApiResponse {
                data: UserResponse::from(updated_user),
                message: "Profile updated successfully".to_string(),
                success: true,
            }))
        }
        Err(db_error) => {
            error!("Failed to update profile for user {}: {}", user_id, db_error);

            let error_msg = db_error.to_string().to_lowercase();
            if error_msg.contains("unique") || error_msg.contains("duplicate") {
                let error_response = if error_msg.contains("email") {
                    ErrorResponse {
                        error: "Email is already taken".to_string(),
                        code: "EMAIL_ALREADY_EXISTS".to_string(),
                        success: false,
                    }
                } else {
                    ErrorResponse {
                        error: "Username is already taken".to_string(),
                        code: "USERNAME_ALREADY_EXISTS".to_string(),
                        success: false,
                    }
                };
                Err((StatusCode::BAD_REQUEST, Json(error_response)))
            } else {
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Internal server error while updating profile".to_string(),
                        code: "DATABASE_ERROR".to_string(),
                        success: false,
                    }),
                ))
            }
        }
    }
}

/// Delete the logged-in user's account
#[utoipa::path(
    post,
    path = "/users/delete",
    tag = "users",
    responses(
        (status = 200, description = "User deleted successfully", body = ApiResponse<String>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn delete_account(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = user.id;
    debug!("Deleting account for user {}", user_id);

    match user::Entity::delete_by_id(user_id).exec(&state.db).await {
        Ok(_) => {
            // Messages and follow edges cascade at the storage layer
            if let Err(e) = clear_session(&session).await {
                warn!("Failed to clear session after account deletion: {}", e);
            }

            info!("User with ID {} deleted successfully", user_id);
            Ok(Json(ApiResponse {
                data: format!("User {} deleted", user_id),
                message: "User deleted successfully".to_string(),
                success: true,
            }))
        }
        Err(db_error) => {
            error!("Failed to delete user with ID {}: {}", user_id, db_error);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error while deleting user".to_string(),
                    code: "DATABASE_ERROR".to_string(),
                    success: false,
                }),
            ))
        }
    }
}

/// List the users a user follows
#[utoipa::path(
    get,
    path = "/users/{user_id}/following",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "Following retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(user_id = user_id))]
pub async fn get_following(
    _current_user: CurrentUser,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, StatusCode> {
    let user_model = match user::Entity::find_by_id(user_id).one(&state.db).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(db_error) => {
            error!("Failed to retrieve user with ID {}: {}", user_id, db_error);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    match user_model.following(&state.db).await {
        Ok(users) => {
            debug!("User {} follows {} users", user_id, users.len());
            Ok(Json(ApiResponse {
                data: users.into_iter().map(UserResponse::from).collect(),
                message: "Following retrieved successfully".to_string(),
                success: true,
            }))
        }
        Err(db_error) => {
            error!("Failed to retrieve following for user {}: {}", user_id, db_error);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// List a user's followers
#[utoipa::path(
    get,
    path = "/users/{user_id}/followers",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "Followers retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(user_id = user_id))]
pub async fn get_followers(
    _current_user: CurrentUser,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, StatusCode> {
    let user_model = match user::Entity::find_by_id(user_id).one(&state.db).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(db_error) => {
            error!("Failed to retrieve user with ID {}: {}", user_id, db_error);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    match user_model.followers(&state.db).await {
        Ok(users) => {
            debug!("User {} has {} followers", user_id, users.len());
            Ok(Json(ApiResponse {
                data: users.into_iter().map(UserResponse::from).collect(),
                message: "Followers retrieved successfully".to_string(),
                success: true,
            }))
        }
        Err(db_error) => {
            error!("Failed to retrieve followers for user {}: {}", user_id, db_error);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Follow another user
#[utoipa::path(
    post,
    path = "/users/follow/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID to follow"),
    ),
    responses(
        (status = 201, description = "Now following the user", body = ApiResponse<UserResponse>),
        (status = 400, description = "Self-follow or already following", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(user_id = user_id))]
pub async fn follow_user(
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), (StatusCode, Json<ErrorResponse>)> {
    trace!("User {} attempting to follow user {}", user.id, user_id);

    if user_id == user.id {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "You cannot follow yourself".to_string(),
                code: "CANNOT_FOLLOW_SELF".to_string(),
                success: false,
            }),
        ));
    }

    let target = match user::Entity::find_by_id(user_id).one(&state.db).await {
        Ok(Some(target)) => target,
        Ok(None) => {
            warn!("User {} tried to follow missing user {}", user.id, user_id);
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("User with id {} does not exist", user_id),
                    code: "USER_NOT_FOUND".to_string(),
                    success: false,
                }),
            ));
        }
        Err(db_error) => {
            error!("Failed to retrieve user with ID {}: {}", user_id, db_error);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error while following user".to_string(),
                    code: "DATABASE_ERROR".to_string(),
                    success: false,
                }),
            ));
        }
    };

    let edge = follow::ActiveModel {
        user_being_followed_id: Set(target.id),
        user_following_id: Set(user.id),
    };

    match edge.insert(&state.db).await {
        Ok(_) => {
            info!("User {} now follows user {}", user.id, target.id);
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse {
                    data: UserResponse::from(target),
                    message: "Now following user".to_string(),
                    success: true,
                }),
            ))
        }
        Err(db_error) => {
            error!(
                "Failed to create follow edge {} -> {}: {}",
                user.id, user_id, db_error
            );

            let error_msg = db_error.to_string().to_lowercase();
            if error_msg.contains("unique") || error_msg.contains("duplicate") {
                Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "Already following this user".to_string(),
                        code: "ALREADY_FOLLOWING".to_string(),
                        success: false,
                    }),
                ))
            } else {
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Internal server error while following user".to_string(),
                        code: "DATABASE_ERROR".to_string(),
                        success: false,
                    }),
                ))
            }
        }
    }
}

/// Stop following a user
#[utoipa::path(
    post,
    path = "/users/stop-following/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID to stop following"),
    ),
    responses(
        (status = 200, description = "Stopped following the user", body = ApiResponse<String>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 404, description = "Not following this user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(user_id = user_id))]
pub async fn unfollow_user(
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, (StatusCode, Json<ErrorResponse>)> {
    trace!("User {} attempting to unfollow user {}", user.id, user_id);

    match follow::Entity::delete_by_id((user_id, user.id))
        .exec(&state.db)
        .await
    {
        Ok(delete_result) if delete_result.rows_affected > 0 => {
            info!("User {} stopped following user {}", user.id, user_id);
            Ok(Json(ApiResponse {
                data: format!("Stopped following user {}", user_id),
                message: "Stopped following user".to_string(),
                success: true,
            }))
        }
        Ok(_) => {
            warn!(
                "User {} tried to unfollow user {} without a follow edge",
                user.id, user_id
            );
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Not following user {}", user_id),
                    code: "NOT_FOLLOWING".to_string(),
                    success: false,
                }),
            ))
        }
        Err(db_error) => {
            error!(
                "Failed to delete follow edge {} -> {}: {}",
                user.id, user_id, db_error
            );
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error while unfollowing user".to_string(),
                    code: "DATABASE_ERROR".to_string(),
                    success: false,
                }),
            ))
        }
    }
}
