//! Durable delivery queue storage.
//!
//! Messages are rows in `queue_messages`. Receiving a message leases it: the row is
//! hidden until its visibility timeout passes and tagged with a lease token. Only
//! the holder of the current token can settle (ack, requeue or discard) it, so a
//! consumer that stalled past its timeout cannot settle a redelivered copy.

use super::{now_ms, Database, StoreResult};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

/// A leased queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub id: i64,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub enqueued_at: i64,
    /// Number of times this message has been handed out, including this one.
    pub delivery_count: i64,
    pub lease_token: String,
}

impl Database {
    /// Append a message to the queue for `routing_key`. Returns its row id.
    pub fn publish_message(
        &self,
        routing_key: &str,
        body: &[u8],
        content_type: &str,
    ) -> StoreResult<i64> {
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO queue_messages (routing_key, body, content_type, enqueued_at, visible_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![routing_key, body, content_type, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Lease the oldest visible message for `routing_key`, hiding it for `visibility_timeout_ms`.
    pub fn receive_message(
        &self,
        routing_key: &str,
        visibility_timeout_ms: i64,
    ) -> StoreResult<Option<QueuedMessage>> {
        let now = now_ms();
        let token = Uuid::now_v7().to_string();

        self.with_conn(|conn| {
            let message = conn
                .query_row(
                    "UPDATE queue_messages
                     SET visible_at = ?1, delivery_count = delivery_count + 1, lease_token = ?2
                     WHERE id = (
                         SELECT id FROM queue_messages
                         WHERE routing_key = ?3 AND visible_at <= ?4
                         ORDER BY visible_at, id
                         LIMIT 1
                     )
                     RETURNING id, routing_key, body, content_type, enqueued_at, delivery_count, lease_token",
                    params![now + visibility_timeout_ms, &token, routing_key, now],
                    |row| {
                        Ok(QueuedMessage {
                            id: row.get(0)?,
                            routing_key: row.get(1)?,
                            body: row.get(2)?,
                            content_type: row.get(3)?,
                            enqueued_at: row.get(4)?,
                            delivery_count: row.get(5)?,
                            lease_token: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            Ok(message)
        })
    }

    /// Remove a leased message permanently. Returns false if the lease is no longer held.
    pub fn ack_message(&self, id: i64, lease_token: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM queue_messages WHERE id = ?1 AND lease_token = ?2",
                params![id, lease_token],
            )?;
            Ok(deleted == 1)
        })
    }

    /// Return a leased message to the queue, visible again after `delay_ms`.
    pub fn requeue_message(&self, id: i64, lease_token: &str, delay_ms: i64) -> StoreResult<bool> {
        let now = now_ms();

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE queue_messages SET visible_at = ?1, lease_token = NULL
                 WHERE id = ?2 AND lease_token = ?3",
                params![now + delay_ms.max(0), id, lease_token],
            )?;
            Ok(updated == 1)
        })
    }

    /// Move a leased message to the dead-letter table; it will never be delivered again.
    pub fn discard_message(&self, id: i64, lease_token: &str, reason: &str) -> StoreResult<bool> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let moved = tx.execute(
                "INSERT INTO queue_dead_letters
                     (id, routing_key, body, enqueued_at, discarded_at, delivery_count, reason)
                 SELECT id, routing_key, body, enqueued_at, ?1, delivery_count, ?2
                 FROM queue_messages WHERE id = ?3 AND lease_token = ?4",
                params![now, reason, id, lease_token],
            )?;

            if moved == 1 {
                tx.execute("DELETE FROM queue_messages WHERE id = ?1", params![id])?;
            }

            tx.commit()?;
            Ok(moved == 1)
        })
    }

    /// Number of messages (visible or leased) waiting under `routing_key`.
    pub fn count_queued_messages(&self, routing_key: &str) -> StoreResult<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM queue_messages WHERE routing_key = ?1",
                params![routing_key],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Number of discarded messages.
    pub fn count_dead_letters(&self) -> StoreResult<i64> {
        self.with_conn(|conn| {
            let count =
                conn.query_row("SELECT COUNT(*) FROM queue_dead_letters", [], |row| row.get(0))?;
            Ok(count)
        })
    }
}
