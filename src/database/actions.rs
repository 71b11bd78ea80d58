mod bookmarks;
mod ingredients;
mod recipes;
mod shopping_cart;
mod subscriptions;
mod tags;
mod users;

pub use bookmarks::*;
pub use ingredients::*;
pub use recipes::*;
pub use shopping_cart::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;

use crate::error::QueryError;

pub(crate) fn begin_error(_e: sqlx::Error) -> potion::Error {
    QueryError::new("Could not start transaction".to_owned()).into()
}

pub(crate) fn commit_error(_e: sqlx::Error) -> potion::Error {
    QueryError::new("Could not commit transaction".to_owned()).into()
}
