//! Task queue: producer and consumer over a durable broker.
//!
//! Messages carry only a task identifier. The task store stays the single source of
//! truth, so a redelivered message never carries stale task content.
//!
//! Delivery is at-least-once:
//! - unparseable body → discarded permanently
//! - handler error → negative-acknowledged and requeued
//! - handler success → acknowledged and removed

mod broker;

pub use broker::{Broker, Delivery, SqliteBroker};

use crate::types::TaskId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Content type of every published message.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Wire format of a queue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: TaskId,
}

/// Errors raised by the queue layer.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker error: {0}")]
    Broker(String),
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ack,
    NackRequeue,
    NackDiscard,
}

/// Callback invoked once per delivered task identifier.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, task_id: TaskId) -> anyhow::Result<()>;
}

/// Publishes task identifiers under a fixed routing key.
#[derive(Clone)]
pub struct Producer {
    broker: Arc<dyn Broker>,
    routing_key: String,
}

impl Producer {
    pub fn new(broker: Arc<dyn Broker>, routing_key: impl Into<String>) -> Self {
        Self {
            broker,
            routing_key: routing_key.into(),
        }
    }

    /// Publish a persistent message pointing at `task_id`.
    pub async fn enqueue(&self, task_id: TaskId) -> Result<(), QueueError> {
        let body = serde_json::to_vec(&QueueMessage { id: task_id })?;

        self.broker
            .publish(&self.routing_key, &body, CONTENT_TYPE_JSON)
            .await?;

        debug!(task_id = %task_id, routing_key = %self.routing_key, "a task was enqueued");
        Ok(())
    }
}

/// Pulls deliveries one at a time and hands each to a [`DeliveryHandler`].
pub struct Consumer {
    broker: Arc<dyn Broker>,
    routing_key: String,
    poll_interval: Duration,
}

impl Consumer {
    pub fn new(broker: Arc<dyn Broker>, routing_key: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            broker,
            routing_key: routing_key.into(),
            poll_interval,
        }
    }

    /// Receive and settle at most one delivery.
    ///
    /// Returns the settlement applied, or `None` if the queue was empty.
    pub async fn process_one(
        &self,
        handler: &dyn DeliveryHandler,
    ) -> Result<Option<Action>, QueueError> {
        let Some(delivery) = self.broker.receive(&self.routing_key).await? else {
            return Ok(None);
        };

        let action = match serde_json::from_slice::<QueueMessage>(&delivery.body) {
            Err(e) => {
                error!(
                    error = %e,
                    message_id = delivery.id,
                    body = %String::from_utf8_lossy(&delivery.body),
                    "failed to unmarshal received message"
                );
                Action::NackDiscard
            }
            Ok(message) => {
                info!(
                    task_id = %message.id,
                    delivery_count = delivery.delivery_count,
                    "received a new task"
                );

                match handler.handle(message.id).await {
                    Ok(()) => {
                        info!(task_id = %message.id, "task handled");
                        Action::Ack
                    }
                    Err(e) => {
                        error!(task_id = %message.id, error = %e, "failed to process the task");
                        Action::NackRequeue
                    }
                }
            }
        };

        let settled = self.broker.settle(&delivery, action).await?;
        if !settled {
            warn!(
                message_id = delivery.id,
                ?action,
                "lease expired before settlement; message will be redelivered"
            );
        }

        Ok(Some(action))
    }

    /// Consume until `shutdown` flips to true.
    ///
    /// Exactly one handler invocation is in flight at a time. An in-flight delivery
    /// is finished and settled before this returns.
    pub async fn start_consuming(
        &self,
        handler: &dyn DeliveryHandler,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), QueueError> {
        info!(routing_key = %self.routing_key, "consumer has been started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let processed = match self.process_one(handler).await {
                Ok(action) => action.is_some(),
                Err(e) => {
                    // Broker hiccups are retried on the next poll
                    error!(error = %e, "failed to receive from the queue");
                    false
                }
            };

            if processed {
                continue;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(routing_key = %self.routing_key, "consumer stopped");
        Ok(())
    }
}
