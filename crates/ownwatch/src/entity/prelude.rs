//! Common re-exports for convenient entity usage.

pub use super::user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, Model as UserModel,
};
