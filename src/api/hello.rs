//! Greeting endpoint
//!
//! Serves the content of a single fixed row of the `messages` table as plain
//! text.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::{
    db::MessageRepository,
    utils::{AppError, AppResult},
    AppState,
};

/// Id of the row served by `GET /hello`
pub const GREETING_MESSAGE_ID: i64 = 1;

/// `GET /hello`
///
/// 200 with the message text, 404 when the row is absent, 500 on any other
/// database failure (including a schema that was never migrated).
pub async fn hello(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let repo = MessageRepository::new(state.db.clone());

    let message = repo
        .get_message(GREETING_MESSAGE_ID)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.content,
    ))
}
