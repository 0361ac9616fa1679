use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::listings::{decode_images, listing_owner, price_at};
use crate::messages::row_to_message_opt;
use crate::models::{Conversation, ConversationOverview, ListingRef};
use crate::unread;
use crate::users::user_ref_at;
use crate::{Database, format_ts, now, parsed_at, ts_at, uuid_at};

const CONVERSATION_COLUMNS: &str =
    "c.id, c.listing_id, c.buyer_id, c.seller_id, c.created_at, c.last_message_at";

/// Conversation, listing, buyer, seller and latest message, in that column
/// order. The latest message is picked by time, then insertion order.
const OVERVIEW_SELECT: &str = "SELECT c.id, c.listing_id, c.buyer_id, c.seller_id, c.created_at, c.last_message_at,
        l.id, l.title, l.images, l.price_cents, l.status,
        b.id, b.name, b.email, b.image, b.location,
        s.id, s.name, s.email, s.image, s.location,
        m.id, m.conversation_id, m.sender_id, m.receiver_id, m.content, m.read, m.created_at
     FROM conversations c
     JOIN listings l ON l.id = c.listing_id
     JOIN users b ON b.id = c.buyer_id
     JOIN users s ON s.id = c.seller_id
     LEFT JOIN messages m ON m.rowid = (
        SELECT rowid FROM messages
        WHERE conversation_id = c.id
        ORDER BY created_at DESC, rowid DESC
        LIMIT 1
     )";

impl Database {
    /// Find the conversation `requester_id` has about `listing_id`, creating it
    /// on first contact. The second value is true when a row was inserted.
    ///
    /// The requester is always the buyer and the listing owner the seller.
    pub fn get_or_create_conversation(
        &self,
        listing_id: Uuid,
        requester_id: Uuid,
    ) -> Result<(Conversation, bool)> {
        let (conversation, created) = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let seller_id = listing_owner(&tx, listing_id)?.ok_or(StoreError::NotFound)?;
            if seller_id == requester_id {
                return Err(StoreError::InvalidOperation(
                    "cannot start a conversation on your own listing".into(),
                ));
            }

            let ts = format_ts(&now());
            let inserted = tx.execute(
                "INSERT INTO conversations (id, listing_id, buyer_id, seller_id, created_at, last_message_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(listing_id, buyer_id, seller_id) DO NOTHING",
                params![
                    Uuid::new_v4().to_string(),
                    listing_id.to_string(),
                    requester_id.to_string(),
                    seller_id.to_string(),
                    ts,
                ],
            )?;

            let conversation = tx.query_row(
                &format!(
                    "SELECT {} FROM conversations c
                     WHERE c.listing_id = ?1 AND c.buyer_id = ?2 AND c.seller_id = ?3",
                    CONVERSATION_COLUMNS
                ),
                params![
                    listing_id.to_string(),
                    requester_id.to_string(),
                    seller_id.to_string()
                ],
                row_to_conversation,
            )?;
            tx.commit()?;
            Ok((conversation, inserted > 0))
        })?;

        if created {
            info!(
                "Conversation {} opened on listing {} by {}",
                conversation.id, listing_id, requester_id
            );
        } else {
            debug!("Conversation {} reused", conversation.id);
        }
        Ok((conversation, created))
    }

    /// The caller's inbox, most recent activity first.
    pub fn conversations_for_user(&self, user_id: Uuid) -> Result<Vec<ConversationOverview>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE c.buyer_id = ?1 OR c.seller_id = ?1
                 ORDER BY c.last_message_at DESC, c.id DESC",
                OVERVIEW_SELECT
            ))?;
            let mut overviews = stmt
                .query_map([user_id.to_string()], row_to_overview)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let counts = unread::unread_counts(conn, user_id)?;
            for overview in &mut overviews {
                overview.unread_count = counts.get(&overview.conversation.id).copied().unwrap_or(0);
            }
            Ok(overviews)
        })
    }

    /// A single inbox row as seen by `viewer_id`.
    pub fn conversation_overview(&self, id: Uuid, viewer_id: Uuid) -> Result<ConversationOverview> {
        self.with_conn(|conn| {
            participant_conversation(conn, id, viewer_id)?;
            let mut overview = conn.query_row(
                &format!("{} WHERE c.id = ?1", OVERVIEW_SELECT),
                [id.to_string()],
                row_to_overview,
            )?;
            overview.unread_count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND receiver_id = ?2 AND read = 0",
                params![id.to_string(), viewer_id.to_string()],
                |r| r.get::<_, i64>(0),
            )? as u32;
            Ok(overview)
        })
    }
}

/// Load a conversation and check membership: `NotFound` if it does not
/// exist, `Forbidden` if `user_id` is not the buyer or seller.
pub(crate) fn participant_conversation(
    conn: &Connection,
    id: Uuid,
    user_id: Uuid,
) -> Result<Conversation> {
    let conversation = conn
        .query_row(
            &format!("SELECT {} FROM conversations c WHERE c.id = ?1", CONVERSATION_COLUMNS),
            [id.to_string()],
            row_to_conversation,
        )
        .optional()?
        .ok_or(StoreError::NotFound)?;
    if !conversation.is_participant(user_id) {
        return Err(StoreError::Forbidden);
    }
    Ok(conversation)
}

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: uuid_at(row, 0)?,
        listing_id: uuid_at(row, 1)?,
        buyer_id: uuid_at(row, 2)?,
        seller_id: uuid_at(row, 3)?,
        created_at: ts_at(row, 4)?,
        last_message_at: ts_at(row, 5)?,
    })
}

fn row_to_overview(row: &Row<'_>) -> rusqlite::Result<ConversationOverview> {
    Ok(ConversationOverview {
        conversation: row_to_conversation(row)?,
        listing: ListingRef {
            id: uuid_at(row, 6)?,
            title: row.get(7)?,
            images: decode_images(row, 8)?,
            price: price_at(row, 9)?,
            status: parsed_at(row, 10)?,
        },
        buyer: user_ref_at(row, 11)?,
        seller: user_ref_at(row, 16)?,
        last_message: row_to_message_opt(row, 21)?,
        unread_count: 0,
    })
}
