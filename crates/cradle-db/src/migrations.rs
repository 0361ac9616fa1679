use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::Result;

pub(crate) const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version > LATEST_VERSION {
        warn!(
            "Database schema v{} is newer than this build knows (v{})",
            version, LATEST_VERSION
        );
    }

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL UNIQUE,
                name                TEXT,
                password            TEXT NOT NULL,
                image               TEXT,
                phone               TEXT,
                location            TEXT,
                is_admin            INTEGER NOT NULL DEFAULT 0,
                payment_account_id  TEXT,
                payment_onboarded   INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE listings (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL REFERENCES users(id),
                title         TEXT NOT NULL,
                description   TEXT NOT NULL,
                price_cents   INTEGER NOT NULL CHECK (price_cents >= 0),
                category      TEXT NOT NULL,
                condition     TEXT NOT NULL,
                location      TEXT NOT NULL,
                age_range     TEXT,
                brand         TEXT,
                size          TEXT,
                images        TEXT NOT NULL DEFAULT '[]',
                status        TEXT NOT NULL DEFAULT 'active'
                                  CHECK (status IN ('active', 'sold', 'deleted')),
                views         INTEGER NOT NULL DEFAULT 0,
                admin_number  TEXT,
                admin_place   TEXT,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE INDEX idx_listings_status_created ON listings(status, created_at);
            CREATE INDEX idx_listings_user ON listings(user_id);

            CREATE TABLE conversations (
                id               TEXT PRIMARY KEY,
                listing_id       TEXT NOT NULL REFERENCES listings(id),
                buyer_id         TEXT NOT NULL REFERENCES users(id),
                seller_id        TEXT NOT NULL REFERENCES users(id),
                created_at       TEXT NOT NULL,
                last_message_at  TEXT NOT NULL,
                UNIQUE(listing_id, buyer_id, seller_id)
            );

            CREATE INDEX idx_conversations_buyer ON conversations(buyer_id, last_message_at);
            CREATE INDEX idx_conversations_seller ON conversations(seller_id, last_message_at);

            CREATE TABLE messages (
                id               TEXT PRIMARY KEY,
                conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id        TEXT NOT NULL REFERENCES users(id),
                receiver_id      TEXT NOT NULL REFERENCES users(id),
                content          TEXT NOT NULL,
                read             INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);
            CREATE INDEX idx_messages_unread ON messages(receiver_id, read, conversation_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
