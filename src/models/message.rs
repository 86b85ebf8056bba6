//! Message models

use sqlx::FromRow;

/// Row of the `messages` application table
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: i64,
    pub content: String,
}
