//! This file serves as the root for all SeaORM entity modules.
//! We define the data models for the Warbler social backend here:
//! users, the messages they post, and the follow edges between them.

pub mod follow;
pub mod message;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::follow::Entity as Follow;
    pub use super::message::Entity as Message;
    pub use super::user::Entity as User;
}
