//! Unread message counts. A message is unread by its receiver until the
//! receiver opens the thread.

use std::collections::HashMap;

use rusqlite::Connection;
use uuid::Uuid;

use crate::error::Result;
use crate::{Database, uuid_at};

impl Database {
    /// Unread messages addressed to `user_id`, across all conversations.
    pub fn total_unread(&self, user_id: Uuid) -> Result<u32> {
        self.with_conn(|conn| total_unread(conn, user_id))
    }

    /// Unread messages addressed to `user_id`, keyed by conversation.
    /// Conversations with nothing unread are absent.
    pub fn unread_counts(&self, user_id: Uuid) -> Result<HashMap<Uuid, u32>> {
        self.with_conn(|conn| unread_counts(conn, user_id))
    }
}

pub(crate) fn total_unread(conn: &Connection, user_id: Uuid) -> Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND read = 0",
        [user_id.to_string()],
        |r| r.get(0),
    )?;
    Ok(count as u32)
}

pub(crate) fn unread_counts(conn: &Connection, user_id: Uuid) -> Result<HashMap<Uuid, u32>> {
    let mut stmt = conn.prepare(
        "SELECT conversation_id, COUNT(*) FROM messages
         WHERE receiver_id = ?1 AND read = 0
         GROUP BY conversation_id",
    )?;
    let rows = stmt.query_map([user_id.to_string()], |row| {
        let count: i64 = row.get(1)?;
        Ok((uuid_at(row, 0)?, count as u32))
    })?;

    let mut counts = HashMap::new();
    for row in rows {
        let (conversation_id, count) = row?;
        counts.insert(conversation_id, count);
    }
    Ok(counts)
}
