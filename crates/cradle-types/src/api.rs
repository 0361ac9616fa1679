use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AgeRange, Category, Condition, ListingStatus, Location};
use crate::price::Price;
use crate::validation::FieldError;

// -- JWT Claims --

/// Identity carried by a bearer token. The REST middleware decodes it once per
/// request and hands it to handlers explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub token: String,
}

// -- Users --

/// The public face of a user, embedded in listings, conversations and messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

// -- Listings --

/// Body of `POST /listings` and `PATCH /listings/{id}`.
///
/// Everything is optional and loosely typed so that validation can report
/// every bad field at once instead of failing on the first one serde sees.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<serde_json::Value>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub age_range: Option<String>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub images: Option<Vec<String>>,
    pub status: Option<String>,
    pub admin_number: Option<String>,
    pub admin_place: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: Price,
    pub category: Category,
    pub condition: Condition,
    pub location: Location,
    pub age_range: Option<AgeRange>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub images: Vec<String>,
    pub status: ListingStatus,
    pub views: i64,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// Query string of `GET /listings`. Values stay raw strings; empty values
/// mean "no filter", matching what an HTML form submits.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSearchParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub admin_number: Option<String>,
    pub admin_place: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateConversationRequest {
    /// Kept as text so an id that is not a UUID reads as an unknown listing.
    pub listing_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListing {
    pub id: Uuid,
    pub title: String,
    pub images: Vec<String>,
    pub price: Price,
    pub status: ListingStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub sender_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub listing: ConversationListing,
    pub buyer: UserSummary,
    pub seller: UserSummary,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: u32,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub sender: UserSummary,
}

// -- Profile --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub listings_count: u32,
    pub active_listings_count: u32,
    pub unread_messages: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
    pub phone: Option<String>,
    pub location: Option<Location>,
    pub payment_account_id: Option<String>,
    pub payment_onboarded: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub stats: ProfileStats,
}
