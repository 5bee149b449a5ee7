use super::user;
use sea_orm::entity::prelude::*;

/// A short post ("warble") authored by a single user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Bounded to 140 characters at the storage layer.
    #[sea_orm(column_type = "String(StringLen::N(140))")]
    pub text: String,
    pub timestamp: DateTimeUtc,
    /// The author; deleting the user deletes their messages.
    pub user_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A message belongs to exactly one author.
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserId",
        to = "user::Column::Id"
    )]
    User,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
