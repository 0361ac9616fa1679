use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use cradle_types::api::{Claims, ConversationResponse, CreateConversationRequest, UnreadCountResponse};
use cradle_types::validation::FieldError;

use crate::auth::{AppState, blocking};
use crate::error::{ApiError, ApiResult};
use crate::views::conversation_response;

/// Open (or reopen) the caller's conversation about a listing.
/// 201 when it was just created, 200 when it already existed.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateConversationRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let listing_id = req
        .listing_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation(vec![FieldError::new("listingId", "Listing ID is required")]))?;
    let listing_id = Uuid::parse_str(listing_id).map_err(|_| ApiError::NotFound)?;
    let buyer_id = claims.sub;

    let (overview, created) = blocking(&state, move |db| {
        let (conversation, created) = db.get_or_create_conversation(listing_id, buyer_id)?;
        let overview = db.conversation_overview(conversation.id, buyer_id)?;
        Ok((overview, created))
    })
    .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(conversation_response(overview))))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ConversationResponse>>> {
    let user_id = claims.sub;
    let overviews = blocking(&state, move |db| db.conversations_for_user(user_id)).await?;
    Ok(Json(overviews.into_iter().map(conversation_response).collect()))
}

/// Total unread messages for the inbox badge.
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UnreadCountResponse>> {
    let user_id = claims.sub;
    let count = blocking(&state, move |db| db.total_unread(user_id)).await?;
    Ok(Json(UnreadCountResponse { count }))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ConversationResponse>> {
    let viewer = claims.sub;
    let overview = blocking(&state, move |db| db.conversation_overview(id, viewer)).await?;
    Ok(Json(conversation_response(overview)))
}
