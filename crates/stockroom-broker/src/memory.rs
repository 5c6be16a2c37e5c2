//! In-process broker with AMQP-like semantics.
//!
//! Models durable exchanges/queues, topic/direct/fanout routing, per-consumer prefetch,
//! ack/nack (with or without requeue) and connection loss (unacked deliveries are requeued
//! and flagged as redelivered). A test and in-process transport: nothing is persisted, and
//! messages rejected without requeue are kept only up to a bounded dead-letter list.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt as _;
use tokio::sync::Notify;

use crate::error::BrokerError;
use crate::topology::topic_matches;
use crate::transport::{
    Acknowledger, BrokerChannel, Delivery, DeliveryStream, ExchangeKind, OutgoingMessage,
    Transport,
};

/// Dead letters kept by default before the oldest are discarded.
pub const DEFAULT_DEAD_LETTER_LIMIT: usize = 1024;

/// Consumers re-check channel state at least this often while idle.
const IDLE_RECHECK: Duration = Duration::from_millis(50);

/// A message held by the in-process broker.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub message_id: String,
    pub exchange: String,
    pub routing_key: String,
    pub timestamp: DateTime<Utc>,
    pub persistent: bool,
    pub redelivered: bool,
    pub body: Vec<u8>,
}

struct InFlight {
    channel: u64,
    consumer: String,
    message: StoredMessage,
}

struct QueueState {
    durable: bool,
    ready: VecDeque<StoredMessage>,
    unacked: HashMap<u64, InFlight>,
    notify: Arc<Notify>,
}

impl QueueState {
    fn new(durable: bool) -> Self {
        Self {
            durable,
            ready: VecDeque::new(),
            unacked: HashMap::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    fn in_flight_for(&self, consumer: &str) -> usize {
        self.unacked
            .values()
            .filter(|f| f.consumer == consumer)
            .count()
    }

    /// Return every unacked delivery matching `pred` to the head of the queue.
    fn requeue_where(&mut self, pred: impl Fn(&InFlight) -> bool) {
        let mut tags: Vec<u64> = self
            .unacked
            .iter()
            .filter(|(_, f)| pred(f))
            .map(|(tag, _)| *tag)
            .collect();
        // Highest tag first so the oldest delivery ends up at the front.
        tags.sort_unstable_by(|a, b| b.cmp(a));
        for tag in tags {
            if let Some(mut inflight) = self.unacked.remove(&tag) {
                inflight.message.redelivered = true;
                self.ready.push_front(inflight.message);
            }
        }
        self.notify.notify_waiters();
        self.notify.notify_one();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Binding {
    queue: String,
    exchange: String,
    routing_key: String,
}

struct State {
    reachable: bool,
    generation: u64,
    next_channel: u64,
    next_tag: u64,
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, QueueState>,
    bindings: BTreeSet<Binding>,
    dead: VecDeque<StoredMessage>,
    dead_limit: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            reachable: true,
            generation: 0,
            next_channel: 0,
            next_tag: 0,
            exchanges: HashMap::new(),
            queues: HashMap::new(),
            bindings: BTreeSet::new(),
            dead: VecDeque::new(),
            dead_limit: DEFAULT_DEAD_LETTER_LIMIT,
        }
    }
}

impl State {
    fn bury(&mut self, message: StoredMessage) {
        if self.dead_limit == 0 {
            return;
        }
        while self.dead.len() >= self.dead_limit {
            self.dead.pop_front();
        }
        self.dead.push_back(message);
    }
}

/// Handle to one in-process broker. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
    connections: Arc<AtomicUsize>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` dead letters, discarding the oldest beyond that.
    pub fn with_dead_letter_limit(limit: usize) -> Self {
        let broker = Self::default();
        broker.lock().dead_limit = limit;
        broker
    }

    /// A transport that opens connections to this broker.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            broker: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test thread panicked mid-operation; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make subsequent connection attempts fail (or succeed again).
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Drop every open connection. Unacked deliveries are requeued as redelivered.
    pub fn sever(&self) {
        let mut state = self.lock();
        state.generation += 1;
        for queue in state.queues.values_mut() {
            queue.requeue_where(|_| true);
        }
    }

    /// Number of successful `open` calls so far.
    pub fn connections_opened(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn exchange_kind(&self, name: &str) -> Option<ExchangeKind> {
        self.lock().exchanges.get(name).copied()
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.lock().queues.contains_key(name)
    }

    pub fn binding_count(&self) -> usize {
        self.lock().bindings.len()
    }

    /// Messages waiting for a consumer.
    pub fn ready_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Messages delivered but not yet settled.
    pub fn unacked_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.unacked.len())
    }

    /// Messages rejected without requeue, oldest first, bounded by the dead-letter limit.
    pub fn dead_letters(&self) -> Vec<StoredMessage> {
        self.lock().dead.iter().cloned().collect()
    }

    fn route(&self, exchange: &str, routing_key: &str, message: OutgoingMessage) -> Result<usize, BrokerError> {
        let mut state = self.lock();
        let kind = *state
            .exchanges
            .get(exchange)
            .ok_or_else(|| BrokerError::Publish(format!("no exchange '{exchange}'")))?;

        let targets: BTreeSet<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange)
            .filter(|b| match kind {
                ExchangeKind::Fanout => true,
                ExchangeKind::Direct => b.routing_key == routing_key,
                ExchangeKind::Topic => topic_matches(&b.routing_key, routing_key),
            })
            .map(|b| b.queue.clone())
            .collect();

        let stored = StoredMessage {
            message_id: message.message_id,
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            timestamp: message.timestamp,
            persistent: message.persistent,
            redelivered: false,
            body: message.body,
        };
        for name in &targets {
            if let Some(queue) = state.queues.get_mut(name) {
                queue.ready.push_back(stored.clone());
                queue.notify.notify_one();
            }
        }
        Ok(targets.len())
    }
}

/// Connects to a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryTransport {
    broker: MemoryBroker,
}

#[async_trait]
impl Transport for MemoryTransport {
    type Channel = MemoryChannel;

    async fn open(&self) -> Result<MemoryChannel, BrokerError> {
        let mut state = self.broker.lock();
        if !state.reachable {
            return Err(BrokerError::Connection(
                "in-process broker is unreachable".to_owned(),
            ));
        }
        state.next_channel += 1;
        let channel = MemoryChannel {
            broker: self.broker.clone(),
            id: state.next_channel,
            generation: state.generation,
            closed: Arc::new(AtomicBool::new(false)),
        };
        self.broker.connections.fetch_add(1, Ordering::SeqCst);
        Ok(channel)
    }
}

#[derive(Clone)]
pub struct MemoryChannel {
    broker: MemoryBroker,
    id: u64,
    generation: u64,
    closed: Arc<AtomicBool>,
}

impl MemoryChannel {
    fn open_in(&self, state: &State) -> bool {
        !self.closed.load(Ordering::SeqCst) && state.generation == self.generation
    }

    fn check_open(&self) -> Result<(), BrokerError> {
        if self.open_in(&self.broker.lock()) {
            Ok(())
        } else {
            Err(BrokerError::ChannelClosed)
        }
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    fn is_open(&self) -> bool {
        self.open_in(&self.broker.lock())
    }

    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        _durable: bool,
    ) -> Result<(), BrokerError> {
        self.check_open()?;
        let mut state = self.broker.lock();
        match state.exchanges.get(name) {
            Some(existing) if *existing != kind => Err(BrokerError::Declare(format!(
                "exchange '{name}' already declared as {}",
                existing.as_str()
            ))),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(name.to_owned(), kind);
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError> {
        self.check_open()?;
        let mut state = self.broker.lock();
        match state.queues.get(name) {
            Some(existing) if existing.durable != durable => Err(BrokerError::Declare(format!(
                "queue '{name}' already declared with durable={}",
                existing.durable
            ))),
            Some(_) => Ok(()),
            None => {
                state.queues.insert(name.to_owned(), QueueState::new(durable));
                Ok(())
            }
        }
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.check_open()?;
        let mut state = self.broker.lock();
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::Declare(format!("no queue '{queue}'")));
        }
        if !state.exchanges.contains_key(exchange) {
            return Err(BrokerError::Declare(format!("no exchange '{exchange}'")));
        }
        state.bindings.insert(Binding {
            queue: queue.to_owned(),
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
        });
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutgoingMessage,
    ) -> Result<bool, BrokerError> {
        self.check_open()?;
        // Unroutable messages are dropped, as with a non-mandatory AMQP publish.
        self.broker.route(exchange, routing_key, message)?;
        Ok(true)
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        prefetch: u16,
    ) -> Result<DeliveryStream, BrokerError> {
        self.check_open()?;
        if !self.broker.has_queue(queue) {
            return Err(BrokerError::Consume(format!("no queue '{queue}'")));
        }
        let cursor = Cursor {
            channel: self.clone(),
            queue: queue.to_owned(),
            consumer: consumer_tag.to_owned(),
            prefetch: usize::from(prefetch.max(1)),
        };
        Ok(futures::stream::unfold(cursor, |cursor| async move {
            let delivery = cursor.next_delivery().await?;
            Some((Ok(delivery), cursor))
        })
        .boxed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(BrokerError::ChannelClosed);
        }
        let id = self.id;
        let mut state = self.broker.lock();
        for queue in state.queues.values_mut() {
            queue.requeue_where(|f| f.channel == id);
        }
        Ok(())
    }
}

struct Cursor {
    channel: MemoryChannel,
    queue: String,
    consumer: String,
    prefetch: usize,
}

impl Cursor {
    /// Wait for the next deliverable message; `None` once the channel is gone.
    async fn next_delivery(&self) -> Option<Delivery> {
        loop {
            let notify = {
                let mut state = self.channel.broker.lock();
                if !self.channel.open_in(&state) {
                    return None;
                }
                state.next_tag += 1;
                let tag = state.next_tag;
                let queue = state.queues.get_mut(&self.queue)?;
                if queue.in_flight_for(&self.consumer) < self.prefetch {
                    if let Some(message) = queue.ready.pop_front() {
                        queue.unacked.insert(
                            tag,
                            InFlight {
                                channel: self.channel.id,
                                consumer: self.consumer.clone(),
                                message: message.clone(),
                            },
                        );
                        return Some(Delivery {
                            message_id: Some(message.message_id),
                            routing_key: message.routing_key,
                            redelivered: message.redelivered,
                            body: message.body,
                            acker: Box::new(MemoryAcker {
                                broker: self.channel.broker.clone(),
                                queue: self.queue.clone(),
                                tag,
                            }),
                        });
                    }
                }
                Arc::clone(&queue.notify)
            };
            let _ = tokio::time::timeout(IDLE_RECHECK, notify.notified()).await;
        }
    }
}

struct MemoryAcker {
    broker: MemoryBroker,
    queue: String,
    tag: u64,
}

impl MemoryAcker {
    fn settle(&self, requeue: Option<bool>) -> Result<(), BrokerError> {
        let mut guard = self.broker.lock();
        let state = &mut *guard;
        let queue = state
            .queues
            .get_mut(&self.queue)
            .ok_or_else(|| BrokerError::Ack(format!("no queue '{}'", self.queue)))?;
        let inflight = queue
            .unacked
            .remove(&self.tag)
            .ok_or_else(|| BrokerError::Ack(format!("unknown delivery tag {}", self.tag)))?;
        queue.notify.notify_one();
        match requeue {
            None => {}
            Some(true) => {
                let mut message = inflight.message;
                message.redelivered = true;
                queue.ready.push_front(message);
            }
            Some(false) => state.bury(inflight.message),
        }
        Ok(())
    }
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.settle(None)
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.settle(Some(requeue))
    }
}
