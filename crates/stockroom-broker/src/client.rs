use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::Utc;
use futures::{FutureExt as _, StreamExt as _};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stockroom_domain::id::MessageId;

use crate::error::BrokerError;
use crate::transport::{BrokerChannel, Delivery, ExchangeKind, OutgoingMessage, Transport};

/// Default per-consumer in-flight limit.
pub const DEFAULT_PREFETCH: u16 = 16;

const CONTENT_TYPE_JSON: &str = "application/json";

/// Owns one connection/channel pair and re-opens it lazily after a drop.
///
/// Construct once per process and share it behind an `Arc`.
pub struct BrokerClient<T: Transport> {
    transport: T,
    channel: Mutex<Option<T::Channel>>,
}

#[derive(Debug, Clone, Copy)]
pub struct SubscribeOptions {
    /// Maximum unacknowledged deliveries for this consumer.
    pub prefetch: u16,
    /// Nack without requeue when a handler runs longer than this.
    pub handler_timeout: Option<Duration>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            prefetch: DEFAULT_PREFETCH,
            handler_timeout: None,
        }
    }
}

/// A running consumer. Dropping the handle leaves the consumer running; call
/// [`Subscription::cancel`] to stop it.
pub struct Subscription {
    queue: String,
    consumer_tag: String,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait until the consumer stops, normally because the connection dropped.
    ///
    /// Await at most once per subscription.
    pub async fn closed(&mut self) {
        let _ = (&mut self.handle).await;
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

enum Outcome {
    Handled,
    Failed(String),
    Panicked,
    TimedOut,
}

impl<T: Transport> BrokerClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            channel: Mutex::new(None),
        }
    }

    /// Open the connection and channel now instead of on first use.
    pub async fn connect(&self) -> Result<(), BrokerError> {
        self.ensure_connection().await.map(|_| ())
    }

    /// Return the cached channel, opening a fresh one if there is none or it dropped.
    pub async fn ensure_connection(&self) -> Result<T::Channel, BrokerError> {
        let mut cached = self.channel.lock().await;
        if let Some(channel) = cached.as_ref() {
            if channel.is_open() {
                return Ok(channel.clone());
            }
            debug!("cached broker channel is closed, reconnecting");
        }
        *cached = None;
        let channel = self.transport.open().await?;
        info!("broker connected");
        *cached = Some(channel.clone());
        Ok(channel)
    }

    pub async fn is_connected(&self) -> bool {
        self.channel
            .lock()
            .await
            .as_ref()
            .is_some_and(|channel| channel.is_open())
    }

    async fn forget_on_transport_error(&self, err: &BrokerError) {
        if err.is_transport() {
            *self.channel.lock().await = None;
        }
    }

    /// Declare a durable exchange. Repeating an identical declaration is a no-op.
    pub async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), BrokerError> {
        let channel = self.ensure_connection().await?;
        let result = channel.declare_exchange(name, kind, true).await;
        if let Err(e) = &result {
            self.forget_on_transport_error(e).await;
        }
        result
    }

    pub async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError> {
        let channel = self.ensure_connection().await?;
        let result = channel.declare_queue(name, durable).await;
        if let Err(e) = &result {
            self.forget_on_transport_error(e).await;
        }
        result
    }

    pub async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        let channel = self.ensure_connection().await?;
        let result = channel.bind_queue(queue, exchange, routing_key).await;
        if let Err(e) = &result {
            self.forget_on_transport_error(e).await;
        }
        result
    }

    /// Serialize `payload` as JSON and publish it as a persistent message.
    ///
    /// `Ok(true)` means the local buffer took the message; delivery is not confirmed.
    pub async fn publish<P>(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &P,
    ) -> Result<bool, BrokerError>
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)?;
        let channel = self
            .ensure_connection()
            .await
            .map_err(|e| BrokerError::Publish(format!("no channel available: {e}")))?;

        let message = OutgoingMessage {
            message_id: MessageId::generate().to_string(),
            timestamp: Utc::now(),
            persistent: true,
            content_type: CONTENT_TYPE_JSON,
            body,
        };
        let message_id = message.message_id.clone();
        match channel.publish(exchange, routing_key, message).await {
            Ok(accepted) => {
                debug!(exchange, routing_key, message_id = %message_id, "message published");
                Ok(accepted)
            }
            Err(e) => {
                self.forget_on_transport_error(&e).await;
                Err(e)
            }
        }
    }

    /// Consume `queue`, decoding each delivery as JSON `M` and passing it to `handler`.
    ///
    /// Deliveries are handled one at a time. Success acks; a handler error, panic, timeout or
    /// undecodable body nacks without requeue, so the message leaves this queue for good.
    /// Deliveries still unacked when the connection drops are redelivered by the broker.
    pub async fn subscribe<M, F, Fut, E>(
        &self,
        queue: &str,
        options: SubscribeOptions,
        handler: F,
    ) -> Result<Subscription, BrokerError>
    where
        M: DeserializeOwned + Send + 'static,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let channel = self.ensure_connection().await?;
        let consumer_tag = format!("{queue}-{}", MessageId::generate());
        let mut deliveries = match channel.consume(queue, &consumer_tag, options.prefetch).await {
            Ok(stream) => stream,
            Err(e) => {
                self.forget_on_transport_error(&e).await;
                return Err(e);
            }
        };

        let queue_name = queue.to_owned();
        let handle = tokio::spawn(async move {
            while let Some(next) = deliveries.next().await {
                match next {
                    Ok(delivery) => {
                        dispatch(&queue_name, delivery, &handler, options.handler_timeout).await
                    }
                    Err(e) => {
                        warn!(queue = %queue_name, error = %e, "consumer stream failed");
                        break;
                    }
                }
            }
            info!(queue = %queue_name, "consumer stopped");
        });

        info!(queue, consumer_tag = %consumer_tag, prefetch = options.prefetch, "subscribed");
        Ok(Subscription {
            queue: queue.to_owned(),
            consumer_tag,
            handle,
        })
    }

    /// Close channel then connection. Never fails; errors are logged.
    pub async fn close(&self) {
        let Some(channel) = self.channel.lock().await.take() else {
            return;
        };
        match channel.close().await {
            Ok(()) => info!("broker connection closed"),
            Err(e) => warn!(error = %e, "broker close failed"),
        }
    }
}

async fn dispatch<M, F, Fut, E>(
    queue: &str,
    delivery: Delivery,
    handler: &F,
    handler_timeout: Option<Duration>,
) where
    M: DeserializeOwned,
    F: Fn(M) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let Delivery {
        message_id,
        redelivered,
        body,
        acker,
        ..
    } = delivery;
    let message_id = message_id.unwrap_or_default();

    let message: M = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!(queue, message_id = %message_id, error = %e, "undecodable message dropped");
            if let Err(e) = acker.nack(false).await {
                warn!(queue, message_id = %message_id, error = %e, "nack failed");
            }
            return;
        }
    };

    let run = AssertUnwindSafe(async move { handler(message).await })
        .catch_unwind()
        .map(|result| match result {
            Ok(Ok(())) => Outcome::Handled,
            Ok(Err(e)) => Outcome::Failed(e.to_string()),
            Err(_) => Outcome::Panicked,
        });
    let outcome = match handler_timeout {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .unwrap_or(Outcome::TimedOut),
        None => run.await,
    };

    let settled = match outcome {
        Outcome::Handled => acker.ack().await,
        Outcome::Failed(error) => {
            warn!(queue, message_id = %message_id, redelivered, error = %error, "handler failed, message dropped");
            acker.nack(false).await
        }
        Outcome::Panicked => {
            warn!(queue, message_id = %message_id, redelivered, "handler panicked, message dropped");
            acker.nack(false).await
        }
        Outcome::TimedOut => {
            warn!(queue, message_id = %message_id, redelivered, "handler timed out, message dropped");
            acker.nack(false).await
        }
    };
    if let Err(e) = settled {
        warn!(queue, message_id = %message_id, error = %e, "failed to settle delivery");
    }
}
