use crate::auth::CurrentUser;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::{message, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for posting a new message
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateMessageRequest {
    /// Message text (1-140 characters)
    #[validate(length(min = 1, max = 140))]
    pub text: String,
}

/// Message response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: i32,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i32,
    /// The author's username
    pub username: String,
}

impl MessageResponse {
    pub fn from_parts(model: message::Model, username: String) -> Self {
        Self {
            id: model.id,
            text: model.text,
            timestamp: model.timestamp,
            user_id: model.user_id,
            username,
        }
    }
}

/// Post a new message as the logged-in user
#[utoipa::path(
    post,
    path = "/messages/new",
    tag = "messages",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message created successfully", body = ApiResponse<MessageResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn create_message(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<CreateMessageRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponse>>), (StatusCode, Json<ErrorResponse>)> {
    debug!("User {} posting a message", user.id);

    let new_message = message::ActiveModel {
        text: Set(request.text.clone()),
        timestamp: Set(Utc::now()),
        user_id: Set(user.id),
        ..Default::default()
    };

    match new_message.insert(&state.db).await {
        Ok(message_model) => {
            info!(
                "Message created successfully with ID: {} by user {}",
                message_model.id, user.id
            );
            let response = ApiResponse {
                data: MessageResponse::from_parts(message_model, user.username),
                message: "Message created successfully".to_string(),
                success: true,
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(db_error) => {
            error!("Failed to create message for user {}: {}", user.id, db_error);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error while creating message".to_string(),
                    code: "DATABASE_ERROR".to_string(),
                    success: false,
                }),
            ))
        }
    }
}

/// Get a single message with its author's username
#[utoipa::path(
    get,
    path = "/messages/{message_id}",
    tag = "messages",
    params(
        ("message_id" = i32, Path, description = "Message ID"),
    ),
    responses(
        (status = 200, description = "Message retrieved successfully", body = ApiResponse<MessageResponse>),
        (status = 404, description = "Message not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(message_id = message_id))]
pub async fn get_message(
    Path(message_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MessageResponse>>, StatusCode> {
    debug!("Fetching message with ID: {}", message_id);

    match message::Entity::find_by_id(message_id)
        .find_also_related(user::Entity)
        .one(&state.db)
        .await
    {
        Ok(Some((message_model, Some(author)))) => {
            let response = ApiResponse {
                data: MessageResponse::from_parts(message_model, author.username),
                message: "Message retrieved successfully".to_string(),
                success: true,
            };
            Ok(Json(response))
        }
        Ok(Some((message_model, None))) => {
            // Unreachable with the cascade in place, but don't 500 on it
            warn!("Message {} has no author", message_model.id);
            Err(StatusCode::NOT_FOUND)
        }
        Ok(None) => {
            // Deleted messages are a plain 404
            warn!("Message with ID {} not found", message_id);
            Err(StatusCode::NOT_FOUND)
        }
        Err(db_error) => {
            error!(
                "Failed to retrieve message with ID {}: {}",
                message_id, db_error
            );
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Delete a message; only its owner may
#[utoipa::path(
    post,
    path = "/messages/{message_id}/delete",
    tag = "messages",
    params(
        ("message_id" = i32, Path, description = "Message ID"),
    ),
    responses(
        (status = 200, description = "Message deleted successfully", body = ApiResponse<String>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Not the message owner", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(message_id = message_id))]
pub async fn delete_message(
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, (StatusCode, Json<ErrorResponse>)> {
    debug!("User {} deleting message {}", user.id, message_id);

    let message_model = match message::Entity::find_by_id(message_id).one(&state.db).await {
        Ok(Some(message)) => message,
        Ok(None) => {
            warn!("Message with ID {} not found for deletion", message_id);
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Message with id {} does not exist", message_id),
                    code: "MESSAGE_NOT_FOUND".to_string(),
                    success: false,
                }),
            ));
        }
        Err(db_error) => {
            error!(
                "Failed to retrieve message with ID {}: {}",
                message_id, db_error
            );
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error while deleting message".to_string(),
                    code: "DATABASE_ERROR".to_string(),
                    success: false,
                }),
            ));
        }
    };

    if message_model.user_id != user.id {
        warn!(
            "User {} tried to delete message {} owned by user {}",
            user.id, message_id, message_model.user_id
        );
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "You do not own this message".to_string(),
                code: "FORBIDDEN".to_string(),
                success: false,
            }),
        ));
    }

    match message::Entity::delete_by_id(message_id).exec(&state.db).await {
        Ok(_) => {
            info!("Message {} deleted by user {}", message_id, user.id);
            Ok(Json(ApiResponse {
                data: format!("Message {} deleted", message_id),
                message: "Message deleted successfully".to_string(),
                success: true,
            }))
        }
        Err(db_error) => {
            error!("Failed to delete message {}: {}", message_id, db_error);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error while deleting message".to_string(),
                    code: "DATABASE_ERROR".to_string(),
                    success: false,
                }),
            ))
        }
    }
}

/// The logged-in user's home timeline: their own messages plus those of the
/// users they follow, newest first, capped at 100
#[utoipa::path(
    get,
    path = "/home",
    tag = "messages",
    responses(
        (status = 200, description = "Timeline retrieved successfully", body = ApiResponse<Vec<MessageResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn home_timeline(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<MessageResponse>>>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Building home timeline for user {}", user.id);

    let following = user.following(&state.db).await.map_err(|db_error| {
        error!(
            "Failed to retrieve following for user {}: {}",
            user.id, db_error
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Internal server error while building timeline".to_string(),
                code: "DATABASE_ERROR".to_string(),
                success: false,
            }),
        )
    })?;

    let mut author_ids: Vec<i32> = following.iter().map(|u| u.id).collect();
    author_ids.push(user.id);

    match message::Entity::find()
        .filter(message::Column::UserId.is_in(author_ids))
        .order_by_desc(message::Column::Timestamp)
        .limit(100)
        .find_also_related(user::Entity)
        .all(&state.db)
        .await
    {
        Ok(rows) => {
            let data: Vec<MessageResponse> = rows
                .into_iter()
                .filter_map(|(m, author)| author.map(|a| MessageResponse::from_parts(m, a.username)))
                .collect();

            info!(
                "Timeline for user {} contains {} messages",
                user.id,
                data.len()
            );
            Ok(Json(ApiResponse {
                data,
                message: "Timeline retrieved successfully".to_string(),
                success: true,
            }))
        }
        Err(db_error) => {
            error!(
                "Failed to retrieve timeline for user {}: {}",
                user.id, db_error
            );
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error while building timeline".to_string(),
                    code: "DATABASE_ERROR".to_string(),
                    success: false,
                }),
            ))
        }
    }
}
