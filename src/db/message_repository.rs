//! Message repository - database operations for the `messages` table

use sqlx::{Pool, Sqlite};

use crate::models::Message;
use crate::utils::AppError;

pub struct MessageRepository {
    pool: Pool<Sqlite>,
}

impl MessageRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get a message by id
    pub async fn get_message(&self, id: i64) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, content
            FROM messages
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }
}
