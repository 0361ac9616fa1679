use axum::{Extension, Json, extract::State};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use cradle_db::models::User;
use cradle_db::{Database, StoreError};
use cradle_types::api::{Claims, ListingResponse, ProfileResponse, ProfileStats, UpdateProfileRequest};
use cradle_types::validation::validate_profile;

use crate::auth::{AppState, blocking};
use crate::error::{ApiError, ApiResult};
use crate::views::listing_response;

fn load_profile(db: &Database, user: User) -> cradle_db::Result<ProfileResponse> {
    let counts = db.listing_counts(user.id)?;
    let unread = db.total_unread(user.id)?;
    Ok(ProfileResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        image: user.image,
        phone: user.phone,
        location: user.location,
        payment_account_id: user.payment_account_id,
        payment_onboarded: user.payment_onboarded,
        is_admin: user.is_admin,
        created_at: user.created_at,
        stats: ProfileStats {
            listings_count: counts.total,
            active_listings_count: counts.active,
            unread_messages: unread,
        },
    })
}

fn current_user(db: &Database, id: Uuid) -> cradle_db::Result<User> {
    db.get_user_by_id(id)?.ok_or(StoreError::NotFound)
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ProfileResponse>> {
    let user_id = claims.sub;
    let profile = blocking(&state, move |db| load_profile(db, current_user(db, user_id)?)).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> ApiResult<Json<ProfileResponse>> {
    let patch = validate_profile(&req)?;
    let user_id = claims.sub;

    let profile = blocking(&state, move |db| {
        let user = db.update_profile(user_id, &patch)?;
        load_profile(db, user)
    })
    .await?;
    Ok(Json(profile))
}

/// The caller's own listings, sold ones included.
pub async fn my_listings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ListingResponse>>> {
    let user_id = claims.sub;
    let (listings, admin) = blocking(&state, move |db| {
        let admin = current_user(db, user_id)?.is_admin;
        Ok((db.listings_for_user(user_id)?, admin))
    })
    .await?;

    Ok(Json(
        listings
            .into_iter()
            .map(|listing| listing_response(listing, None, admin))
            .collect(),
    ))
}
