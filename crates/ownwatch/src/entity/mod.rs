//! SeaORM entity definitions for the ownwatch database schema.

pub mod prelude;
pub mod user;
