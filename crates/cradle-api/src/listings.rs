use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};
use uuid::Uuid;

use cradle_db::Database;
use cradle_types::api::{Claims, DeleteResponse, ListingRequest, ListingResponse, ListingSearchParams};
use cradle_types::validation::{validate_listing, validate_search};

use crate::auth::{AppState, blocking};
use crate::error::{ApiError, ApiResult};
use crate::middleware::optional_claims;
use crate::views::listing_response;

fn is_admin(db: &Database, user_id: Option<Uuid>) -> cradle_db::Result<bool> {
    match user_id {
        Some(id) => Ok(db.get_user_by_id(id)?.is_some_and(|u| u.is_admin)),
        None => Ok(false),
    }
}

/// Browse active listings. Admin search fields are honored for admins only
/// and silently dropped for everyone else. A storage failure yields an empty
/// page rather than an error.
pub async fn search_listings(
    State(state): State<AppState>,
    headers: HeaderMap,
    WithRejection(Query(params), _): WithRejection<Query<ListingSearchParams>, ApiError>,
) -> ApiResult<Json<Vec<ListingResponse>>> {
    let filters = validate_search(&params)?;
    let caller = optional_claims(&headers, &state.jwt_secret).map(|c| c.sub);

    let result = blocking(&state, move |db| {
        let admin = is_admin(db, caller)?;
        let filters = if admin { filters } else { filters.without_admin_fields() };
        Ok((db.search_listings(&filters)?, admin))
    })
    .await;

    match result {
        Ok((rows, admin)) => Ok(Json(
            rows.into_iter()
                .map(|row| listing_response(row.listing, Some(row.owner), admin))
                .collect(),
        )),
        Err(e) => {
            warn!("Listing search failed, returning no results: {}", e);
            Ok(Json(Vec::new()))
        }
    }
}

pub async fn create_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<ListingRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let mut valid = validate_listing(&req)?;
    // New listings always start active.
    valid.status = None;
    let owner_id = claims.sub;

    let (listing, admin) = blocking(&state, move |db| {
        let admin = is_admin(db, Some(owner_id))?;
        let valid = if admin { valid } else { valid.without_admin_fields() };
        Ok((db.create_listing(owner_id, &valid)?, admin))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(listing_response(listing, None, admin))))
}

/// Listing detail. Counts a view unless the caller owns the listing.
pub async fn get_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ListingResponse>> {
    let viewer = optional_claims(&headers, &state.jwt_secret).map(|c| c.sub);

    let (row, admin) = blocking(&state, move |db| {
        let row = db.view_listing(id, viewer)?;
        Ok((row, is_admin(db, viewer)?))
    })
    .await?;

    Ok(Json(listing_response(row.listing, Some(row.owner), admin)))
}

pub async fn update_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<ListingRequest>, ApiError>,
) -> ApiResult<Json<ListingResponse>> {
    let valid = validate_listing(&req)?;
    let actor_id = claims.sub;

    let (listing, admin) = blocking(&state, move |db| {
        let admin = is_admin(db, Some(actor_id))?;
        Ok((db.update_listing(id, actor_id, &valid, admin)?, admin))
    })
    .await?;
    info!("Listing {} updated by {}", id, actor_id);

    Ok(Json(listing_response(listing, None, admin)))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<DeleteResponse>> {
    let actor_id = claims.sub;
    blocking(&state, move |db| db.delete_listing(id, actor_id)).await?;
    Ok(Json(DeleteResponse { success: true }))
}
