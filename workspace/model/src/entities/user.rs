use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, QueryFilter, QueryOrder, Set};

use crate::password::{self, PasswordError};

/// Avatar used when signup does not provide one.
pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.png";
/// Profile header image used for new accounts.
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.jpg";

/// Represents a user of the system.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    /// Argon2id hash in PHC string format, never a plain password.
    pub password_hash: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    // A user can author multiple messages.
    #[sea_orm(has_many = "super::message::Entity")]
    Message,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

/// Users this user follows, reached through the `follows` join table.
#[derive(Debug)]
pub struct FollowingLink;

impl Linked for FollowingLink {
    type FromEntity = Entity;
    type ToEntity = Entity;

    fn link(&self) -> Vec<RelationDef> {
        vec![
            super::follow::Relation::Follower.def().rev(),
            super::follow::Relation::Followed.def(),
        ]
    }
}

/// Users following this user.
#[derive(Debug)]
pub struct FollowersLink;

impl Linked for FollowersLink {
    type FromEntity = Entity;
    type ToEntity = Entity;

    fn link(&self) -> Vec<RelationDef> {
        vec![
            super::follow::Relation::Followed.def().rev(),
            super::follow::Relation::Follower.def(),
        ]
    }
}

/// Errors surfaced by [`Entity::signup`].
#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    /// The password may not be empty; hashing an empty string would
    /// silently produce an account nobody intends to exist.
    #[error("password must not be empty")]
    EmptyPassword,
    #[error(transparent)]
    Hash(#[from] PasswordError),
    /// Includes uniqueness violations on username/email.
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl Entity {
    /// Hashes the password and inserts a new user row.
    ///
    /// Username/email uniqueness is enforced by the storage layer; a
    /// violation bubbles up as [`SignupError::Db`].
    pub async fn signup(
        db: &DatabaseConnection,
        username: &str,
        email: &str,
        password: &str,
        image_url: Option<String>,
    ) -> Result<Model, SignupError> {
        if password.is_empty() {
            return Err(SignupError::EmptyPassword);
        }

        let password_hash = password::hash_password(password)?;

        let user = ActiveModel {
            username: Set(username.to_owned()),
            email: Set(email.to_owned()),
            password_hash: Set(password_hash),
            image_url: Set(Some(
                image_url.unwrap_or_else(|| DEFAULT_IMAGE_URL.to_owned()),
            )),
            header_image_url: Set(Some(DEFAULT_HEADER_IMAGE_URL.to_owned())),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(user)
    }

    /// Looks up `username` and verifies `password` against the stored hash.
    ///
    /// Returns `None` for an unknown username or a wrong password; the two
    /// cases are indistinguishable to the caller.
    pub async fn authenticate(
        db: &DatabaseConnection,
        username: &str,
        password: &str,
    ) -> Result<Option<Model>, DbErr> {
        let Some(user) = Entity::find()
            .filter(Column::Username.eq(username))
            .one(db)
            .await?
        else {
            return Ok(None);
        };

        match password::verify_password(password, &user.password_hash) {
            Ok(true) => Ok(Some(user)),
            _ => Ok(None),
        }
    }
}

impl Model {
    /// Does this user follow the user with id `other_id`?
    pub async fn is_following(
        &self,
        db: &DatabaseConnection,
        other_id: i32,
    ) -> Result<bool, DbErr> {
        Ok(super::follow::Entity::find_by_id((other_id, self.id))
            .one(db)
            .await?
            .is_some())
    }

    /// Is this user followed by the user with id `other_id`?
    pub async fn is_followed_by(
        &self,
        db: &DatabaseConnection,
        other_id: i32,
    ) -> Result<bool, DbErr> {
        Ok(super::follow::Entity::find_by_id((self.id, other_id))
            .one(db)
            .await?
            .is_some())
    }

    /// Users this user follows.
    pub async fn following(&self, db: &DatabaseConnection) -> Result<Vec<Model>, DbErr> {
        self.find_linked(FollowingLink).all(db).await
    }

    /// Users following this user.
    pub async fn followers(&self, db: &DatabaseConnection) -> Result<Vec<Model>, DbErr> {
        self.find_linked(FollowersLink).all(db).await
    }

    /// This user's messages, newest first.
    pub async fn messages(
        &self,
        db: &DatabaseConnection,
    ) -> Result<Vec<super::message::Model>, DbErr> {
        self.find_related(super::message::Entity)
            .order_by_desc(super::message::Column::Timestamp)
            .all(db)
            .await
    }
}

impl ActiveModelBehavior for ActiveModel {}
