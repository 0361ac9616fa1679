use rusqlite::{Connection, Row, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::conversations::participant_conversation;
use crate::error::{Result, StoreError};
use crate::models::{Message, MessageWithSender};
use crate::users::user_ref_at;
use crate::{Database, format_ts, now, ts_at, uuid_at};

/// Longest message body accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 5000;

const MESSAGE_COLUMNS: &str =
    "m.id, m.conversation_id, m.sender_id, m.receiver_id, m.content, m.read, m.created_at";

impl Database {
    /// Append a message and bump the conversation's `last_message_at` to the
    /// message's timestamp, atomically.
    pub fn post_message(&self, conversation_id: Uuid, sender_id: Uuid, content: &str) -> Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::Validation("message content is required".into()));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(StoreError::Validation(format!(
                "message content must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let message = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let conversation = participant_conversation(&tx, conversation_id, sender_id)?;

            let receiver_id = conversation
                .other_participant(sender_id)
                .ok_or(StoreError::Forbidden)?;
            let message = Message {
                id: Uuid::new_v4(),
                conversation_id,
                sender_id,
                receiver_id,
                content: content.to_string(),
                read: false,
                created_at: now(),
            };
            let ts = format_ts(&message.created_at);

            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    message.id.to_string(),
                    conversation_id.to_string(),
                    sender_id.to_string(),
                    receiver_id.to_string(),
                    message.content,
                    ts,
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET last_message_at = ?1 WHERE id = ?2",
                params![ts, conversation_id.to_string()],
            )?;
            tx.commit()?;
            Ok(message)
        })?;

        info!(
            "Message {} in conversation {} from {} to {}",
            message.id, conversation_id, sender_id, message.receiver_id
        );
        Ok(message)
    }

    /// Every message in the thread, oldest first, as they stood before this
    /// call; then everything addressed to `reader_id` is marked read. Both
    /// steps share one transaction so nothing arriving in between is marked
    /// without having been returned.
    pub fn read_thread(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<Vec<MessageWithSender>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            participant_conversation(&tx, conversation_id, reader_id)?;

            let messages = thread(&tx, conversation_id)?;
            let marked = mark_read(&tx, conversation_id, reader_id)?;
            tx.commit()?;

            if marked > 0 {
                debug!("Marked {} message(s) read in {} for {}", marked, conversation_id, reader_id);
            }
            Ok(messages)
        })
    }

    /// Mark everything addressed to `reader_id` in the conversation as read.
    /// Returns how many rows changed, so a repeat call returns 0.
    pub fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| {
            participant_conversation(conn, conversation_id, reader_id)?;
            mark_read(conn, conversation_id, reader_id)
        })
    }
}

fn thread(conn: &Connection, conversation_id: Uuid) -> Result<Vec<MessageWithSender>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, u.id, u.name, u.email, u.image, u.location
         FROM messages m JOIN users u ON u.id = m.sender_id
         WHERE m.conversation_id = ?1
         ORDER BY m.created_at ASC, m.rowid ASC",
        MESSAGE_COLUMNS
    ))?;
    let rows = stmt
        .query_map([conversation_id.to_string()], |row| {
            Ok(MessageWithSender {
                message: row_to_message(row, 0)?,
                sender: user_ref_at(row, 7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn mark_read(conn: &Connection, conversation_id: Uuid, reader_id: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE messages SET read = 1
         WHERE conversation_id = ?1 AND receiver_id = ?2 AND read = 0",
        params![conversation_id.to_string(), reader_id.to_string()],
    )?)
}

fn row_to_message(row: &Row<'_>, start: usize) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_at(row, start)?,
        conversation_id: uuid_at(row, start + 1)?,
        sender_id: uuid_at(row, start + 2)?,
        receiver_id: uuid_at(row, start + 3)?,
        content: row.get(start + 4)?,
        read: row.get(start + 5)?,
        created_at: ts_at(row, start + 6)?,
    })
}

/// A message from LEFT JOINed columns; `None` when the join found nothing.
pub(crate) fn row_to_message_opt(row: &Row<'_>, start: usize) -> rusqlite::Result<Option<Message>> {
    let id: Option<String> = row.get(start)?;
    match id {
        Some(_) => row_to_message(row, start).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{listing, open_temp, user};

    struct Thread {
        _dir: tempfile::TempDir,
        db: Database,
        seller: Uuid,
        buyer: Uuid,
        conversation: Uuid,
    }

    fn thread_fixture() -> Thread {
        let (dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        let buyer = user(&db, "buyer@example.com");
        let item = db.create_listing(seller, &listing(120)).unwrap();
        let (conv, _) = db.get_or_create_conversation(item.id, buyer).unwrap();
        Thread { _dir: dir, db, seller, buyer, conversation: conv.id }
    }

    #[test]
    fn posting_bumps_last_message_at() {
        let t = thread_fixture();
        let message = t.db.post_message(t.conversation, t.buyer, "  Is this available?  ").unwrap();
        assert_eq!(message.content, "Is this available?");
        assert_eq!(message.receiver_id, t.seller);
        assert!(!message.read);

        let overview = t.db.conversation_overview(t.conversation, t.buyer).unwrap();
        assert_eq!(overview.conversation.last_message_at, message.created_at);
    }

    #[test]
    fn empty_or_oversized_content_is_rejected() {
        let t = thread_fixture();
        assert!(matches!(
            t.db.post_message(t.conversation, t.buyer, "   \n"),
            Err(StoreError::Validation(_))
        ));
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            t.db.post_message(t.conversation, t.buyer, &long),
            Err(StoreError::Validation(_))
        ));
        assert!(t.db.read_thread(t.conversation, t.seller).unwrap().is_empty());
    }

    #[test]
    fn content_is_checked_before_membership() {
        let t = thread_fixture();
        let outsider = user(&t.db, "outsider@example.com");
        assert!(matches!(
            t.db.post_message(Uuid::new_v4(), t.buyer, "  "),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            t.db.post_message(t.conversation, outsider, ""),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn only_participants_may_post() {
        let t = thread_fixture();
        let outsider = user(&t.db, "outsider@example.com");
        assert!(matches!(
            t.db.post_message(t.conversation, outsider, "hi"),
            Err(StoreError::Forbidden)
        ));
        assert!(matches!(
            t.db.post_message(Uuid::new_v4(), t.buyer, "hi"),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            t.db.read_thread(t.conversation, outsider),
            Err(StoreError::Forbidden)
        ));
    }

    #[test]
    fn thread_is_oldest_first_and_reports_pre_read_state() {
        let t = thread_fixture();
        t.db.post_message(t.conversation, t.buyer, "first").unwrap();
        t.db.post_message(t.conversation, t.seller, "second").unwrap();
        t.db.post_message(t.conversation, t.buyer, "third").unwrap();

        let seen = t.db.read_thread(t.conversation, t.seller).unwrap();
        let contents: Vec<_> = seen.iter().map(|m| m.message.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert!(!seen[0].message.read);
        assert_eq!(seen[0].sender.email, "buyer@example.com");

        let again = t.db.read_thread(t.conversation, t.seller).unwrap();
        assert!(again[0].message.read && again[2].message.read);
        // The seller's own message stays unread until the buyer opens the thread.
        assert!(!again[1].message.read);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let t = thread_fixture();
        t.db.post_message(t.conversation, t.buyer, "one").unwrap();
        t.db.post_message(t.conversation, t.buyer, "two").unwrap();

        assert_eq!(t.db.mark_read(t.conversation, t.seller).unwrap(), 2);
        assert_eq!(t.db.total_unread(t.seller).unwrap(), 0);
        assert_eq!(t.db.mark_read(t.conversation, t.seller).unwrap(), 0);
        assert_eq!(t.db.total_unread(t.seller).unwrap(), 0);
    }
}
