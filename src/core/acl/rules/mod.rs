//! Built-in rules

mod actions;
mod auth_key;
mod indices;

pub use actions::ActionsRule;
pub use auth_key::AuthKeyRule;
pub use indices::IndicesRule;
