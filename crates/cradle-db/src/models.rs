//! Database row types. Kept separate from the cradle-types API models so the
//! store does not depend on how responses are shaped.

use chrono::{DateTime, Utc};
use cradle_types::{AgeRange, Category, Condition, ListingStatus, Location, Price};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub image: Option<String>,
    pub phone: Option<String>,
    pub location: Option<Location>,
    pub is_admin: bool,
    pub payment_account_id: Option<String>,
    pub payment_onboarded: bool,
    pub created_at: DateTime<Utc>,
}

/// The few user columns embedded in listings, conversations and messages.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRef {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub id: Uuid,
    pub user_id: Uuid,
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
    pub admin_number: Option<String>,
    pub admin_place: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ListingWithOwner {
    pub listing: Listing,
    pub owner: UserRef,
}

/// Listing columns shown next to a conversation.
#[derive(Debug, Clone)]
pub struct ListingRef {
    pub id: Uuid,
    pub title: String,
    pub images: Vec<String>,
    pub price: Price,
    pub status: ListingStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingCounts {
    pub total: u32,
    pub active: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    /// The participant who is not `user_id`, if `user_id` is a participant.
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.buyer_id {
            Some(self.seller_id)
        } else if user_id == self.seller_id {
            Some(self.buyer_id)
        } else {
            None
        }
    }
}

/// One inbox row: the conversation with everything the list view shows.
#[derive(Debug, Clone)]
pub struct ConversationOverview {
    pub conversation: Conversation,
    pub listing: ListingRef,
    pub buyer: UserRef,
    pub seller: UserRef,
    pub last_message: Option<Message>,
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MessageWithSender {
    pub message: Message,
    pub sender: UserRef,
}
