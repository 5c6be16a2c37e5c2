//! Broker client and event publisher.
//!
//! [`client::BrokerClient`] owns one connection/channel pair per process and reconnects lazily;
//! it is generic over a [`transport::Transport`] so the same code runs against RabbitMQ
//! ([`amqp::AmqpTransport`]) or the in-process broker ([`memory::MemoryBroker`]).
//! [`publisher::EventPublisher`] maps domain events onto the fixed routing table.

pub mod amqp;
pub mod client;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod topology;
pub mod transport;

pub use client::{BrokerClient, SubscribeOptions, Subscription};
pub use error::BrokerError;
pub use publisher::EventPublisher;
pub use transport::{BrokerChannel, ExchangeKind, Transport};
