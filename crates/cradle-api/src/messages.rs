use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use cradle_db::StoreError;
use cradle_db::models::{MessageWithSender, UserRef};
use cradle_types::api::{Claims, MessageResponse, SendMessageRequest};

use crate::auth::{AppState, blocking};
use crate::error::{ApiError, ApiResult};
use crate::views::message_response;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(conversation_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let content = req.content.unwrap_or_default();
    let sender_id = claims.sub;

    let row = blocking(&state, move |db| {
        let message = db.post_message(conversation_id, sender_id, &content)?;
        let sender = db.get_user_by_id(sender_id)?.ok_or(StoreError::NotFound)?;
        Ok(MessageWithSender {
            message,
            sender: UserRef {
                id: sender.id,
                name: sender.name,
                email: sender.email,
                image: sender.image,
                location: sender.location,
            },
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message_response(row))))
}

/// The whole thread, oldest first. Opening it marks everything addressed to
/// the caller as read; the response shows the state before that.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(conversation_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let reader_id = claims.sub;
    let rows = blocking(&state, move |db| db.read_thread(conversation_id, reader_id)).await?;
    Ok(Json(rows.into_iter().map(message_response).collect()))
}
