//! Row-to-response shaping.

use cradle_db::models::{ConversationOverview, Listing, MessageWithSender, UserRef};
use cradle_types::api::{
    ConversationListing, ConversationResponse, LastMessage, ListingResponse, MessageResponse,
    UserSummary,
};

pub fn user_summary(user: UserRef) -> UserSummary {
    UserSummary {
        id: user.id,
        name: user.name,
        email: user.email,
        image: user.image,
        location: user.location,
    }
}

/// Admin-only columns are dropped unless `show_admin_fields` is set.
pub fn listing_response(listing: Listing, owner: Option<UserRef>, show_admin_fields: bool) -> ListingResponse {
    let (admin_number, admin_place) = if show_admin_fields {
        (listing.admin_number, listing.admin_place)
    } else {
        (None, None)
    };

    ListingResponse {
        id: listing.id,
        title: listing.title,
        description: listing.description,
        price: listing.price,
        category: listing.category,
        condition: listing.condition,
        location: listing.location,
        age_range: listing.age_range,
        brand: listing.brand,
        size: listing.size,
        images: listing.images,
        status: listing.status,
        views: listing.views,
        user_id: listing.user_id,
        created_at: listing.created_at,
        updated_at: listing.updated_at,
        admin_number,
        admin_place,
        user: owner.map(user_summary),
    }
}

pub fn conversation_response(overview: ConversationOverview) -> ConversationResponse {
    let ConversationOverview {
        conversation,
        listing,
        buyer,
        seller,
        last_message,
        unread_count,
    } = overview;

    ConversationResponse {
        id: conversation.id,
        listing_id: conversation.listing_id,
        buyer_id: conversation.buyer_id,
        seller_id: conversation.seller_id,
        created_at: conversation.created_at,
        last_message_at: conversation.last_message_at,
        listing: ConversationListing {
            id: listing.id,
            title: listing.title,
            images: listing.images,
            price: listing.price,
            status: listing.status,
        },
        buyer: user_summary(buyer),
        seller: user_summary(seller),
        last_message: last_message.map(|m| LastMessage {
            id: m.id,
            content: m.content,
            read: m.read,
            created_at: m.created_at,
            sender_id: m.sender_id,
        }),
        unread_count,
    }
}

pub fn message_response(row: MessageWithSender) -> MessageResponse {
    let MessageWithSender { message, sender } = row;
    MessageResponse {
        id: message.id,
        conversation_id: message.conversation_id,
        sender_id: message.sender_id,
        receiver_id: message.receiver_id,
        content: message.content,
        read: message.read,
        created_at: message.created_at,
        sender: user_summary(sender),
    }
}
