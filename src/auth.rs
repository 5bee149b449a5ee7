//! Session-based authentication.
//!
//! The session stores the authenticated user's id under [`CURR_USER_KEY`];
//! the [`CurrentUser`] extractor resolves it back to a database user on each
//! request so handlers always see current state.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::Json,
};
use model::entities::user;
use sea_orm::EntityTrait;
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::schemas::{AppState, ErrorResponse};

/// Session key holding the authenticated user's id.
pub const CURR_USER_KEY: &str = "curr_user";

/// Stores the authenticated user's id in the session.
pub async fn set_session_user(
    session: &Session,
    user_id: i32,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(CURR_USER_KEY, user_id).await
}

/// Clears the session (logout).
pub async fn clear_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

fn unauthorized() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "Authentication required".to_string(),
            code: "UNAUTHORIZED".to_string(),
            success: false,
        }),
    )
}

/// Extractor for the authenticated user.
///
/// Rejects with 401 when the session is missing, holds no user id, or
/// references a user that no longer exists.
///
/// # Example
///
/// ```ignore
/// async fn protected_endpoint(
///     CurrentUser(user): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct CurrentUser(pub user::Model);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| unauthorized())?;

        let Some(user_id) = session.get::<i32>(CURR_USER_KEY).await.ok().flatten() else {
            debug!("No authenticated user in session");
            return Err(unauthorized());
        };

        match user::Entity::find_by_id(user_id).one(&app_state.db).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => {
                warn!("Session references missing user {}", user_id);
                Err(unauthorized())
            }
            Err(db_error) => {
                warn!("Failed to load session user {}: {}", user_id, db_error);
                Err(unauthorized())
            }
        }
    }
}
