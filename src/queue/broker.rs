//! Broker seam and the SQLite-backed implementation.

use super::{Action, QueueError};
use crate::db::queue::QueuedMessage;
use crate::db::{Database, StoreError};
use async_trait::async_trait;
use std::time::Duration;

/// A message handed to a consumer, to be settled exactly once.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: i64,
    pub body: Vec<u8>,
    pub delivery_count: i64,
    lease_token: String,
}

impl Delivery {
    pub fn new(id: i64, body: Vec<u8>, delivery_count: i64, lease_token: impl Into<String>) -> Self {
        Self {
            id,
            body,
            delivery_count,
            lease_token: lease_token.into(),
        }
    }

    pub fn lease_token(&self) -> &str {
        &self.lease_token
    }
}

impl From<QueuedMessage> for Delivery {
    fn from(message: QueuedMessage) -> Self {
        Self::new(
            message.id,
            message.body,
            message.delivery_count,
            message.lease_token,
        )
    }
}

/// Durable message transport.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Persist a message under `routing_key`.
    async fn publish(&self, routing_key: &str, body: &[u8], content_type: &str)
        -> Result<(), QueueError>;

    /// Lease the next visible message, if any.
    async fn receive(&self, routing_key: &str) -> Result<Option<Delivery>, QueueError>;

    /// Apply `action` to a leased delivery. Returns false if the lease was lost.
    async fn settle(&self, delivery: &Delivery, action: Action) -> Result<bool, QueueError>;
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        QueueError::Broker(err.to_string())
    }
}

/// Broker that stores messages in the `queue_messages` table.
#[derive(Clone)]
pub struct SqliteBroker {
    db: Database,
    visibility_timeout: Duration,
    requeue_delay: Duration,
}

impl SqliteBroker {
    /// `visibility_timeout` bounds how long an unsettled delivery stays hidden;
    /// `requeue_delay` is how long a negatively-acknowledged message waits.
    pub fn new(db: Database, visibility_timeout: Duration, requeue_delay: Duration) -> Self {
        Self {
            db,
            visibility_timeout,
            requeue_delay,
        }
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl Broker for SqliteBroker {
    async fn publish(
        &self,
        routing_key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), QueueError> {
        self.db.publish_message(routing_key, body, content_type)?;
        Ok(())
    }

    async fn receive(&self, routing_key: &str) -> Result<Option<Delivery>, QueueError> {
        let message = self
            .db
            .receive_message(routing_key, duration_ms(self.visibility_timeout))?;
        Ok(message.map(Delivery::from))
    }

    async fn settle(&self, delivery: &Delivery, action: Action) -> Result<bool, QueueError> {
        let settled = match action {
            Action::Ack => self.db.ack_message(delivery.id, delivery.lease_token())?,
            Action::NackRequeue => self.db.requeue_message(
                delivery.id,
                delivery.lease_token(),
                duration_ms(self.requeue_delay),
            )?,
            Action::NackDiscard => {
                self.db
                    .discard_message(delivery.id, delivery.lease_token(), "malformed message")?
            }
        };
        Ok(settled)
    }
}
