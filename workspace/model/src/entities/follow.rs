use super::user;
use sea_orm::entity::prelude::*;

/// Directed follow edge: `user_following_id` subscribes to the messages
/// posted by `user_being_followed_id`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "follows")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub user_being_followed_id: i32,
    #[sea_orm(primary_key)]
    pub user_following_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserBeingFollowedId",
        to = "user::Column::Id"
    )]
    Followed,
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserFollowingId",
        to = "user::Column::Id"
    )]
    Follower,
}

impl ActiveModelBehavior for ActiveModel {}
