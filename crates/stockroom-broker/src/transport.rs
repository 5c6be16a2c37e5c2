//! The seam between [`crate::client::BrokerClient`] and a concrete broker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::BrokerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    Direct,
    Topic,
    Fanout,
}

impl ExchangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Topic => "topic",
            Self::Fanout => "fanout",
        }
    }
}

/// A message ready to hand to the broker. Built by the client, never by callers.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    /// Survives a broker restart when the target queue is durable.
    pub persistent: bool,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Settles one delivery. Exactly one of `ack`/`nack` should be called.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
    async fn nack(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// A message handed to a consumer.
pub struct Delivery {
    pub message_id: Option<String>,
    pub routing_key: String,
    pub redelivered: bool,
    pub body: Vec<u8>,
    pub acker: Box<dyn Acknowledger>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message_id", &self.message_id)
            .field("routing_key", &self.routing_key)
            .field("redelivered", &self.redelivered)
            .field("body_len", &self.body.len())
            .finish()
    }
}

pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// Opens connections. One `open` = one connection carrying one channel.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Channel: BrokerChannel;

    async fn open(&self) -> Result<Self::Channel, BrokerError>;
}

/// An open channel. Cheap to clone; clones share the underlying connection.
///
/// Declarations must be idempotent: repeating one with identical arguments succeeds
/// and creates nothing new.
#[async_trait]
pub trait BrokerChannel: Clone + Send + Sync + 'static {
    /// False once the connection dropped or the channel was closed.
    fn is_open(&self) -> bool;

    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), BrokerError>;

    async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError>;

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError>;

    /// Returns whether the local buffer accepted the message; not a delivery confirmation.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutgoingMessage,
    ) -> Result<bool, BrokerError>;

    /// Start consuming with at most `prefetch` unacknowledged deliveries in flight.
    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        prefetch: u16,
    ) -> Result<DeliveryStream, BrokerError>;

    /// Close the channel, then its connection.
    async fn close(&self) -> Result<(), BrokerError>;
}
