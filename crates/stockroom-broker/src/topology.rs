//! Exchange/queue layout and topic routing-key matching.

use tracing::info;

use stockroom_domain::event::{EventKind, INVENTORY_EXCHANGE, NOTIFICATIONS_EXCHANGE};

use crate::client::BrokerClient;
use crate::error::BrokerError;
use crate::transport::{ExchangeKind, Transport};

/// Declare both topic exchanges, the five durable queues and their bindings.
///
/// Every step is idempotent, so every process calls this at startup.
pub async fn declare_topology<T: Transport>(client: &BrokerClient<T>) -> Result<(), BrokerError> {
    for exchange in [INVENTORY_EXCHANGE, NOTIFICATIONS_EXCHANGE] {
        client.declare_exchange(exchange, ExchangeKind::Topic).await?;
    }
    for kind in EventKind::ALL {
        client.declare_queue(kind.queue(), true).await?;
        client
            .bind_queue(kind.queue(), kind.exchange(), kind.routing_key())
            .await?;
    }
    info!(
        exchanges = 2,
        queues = EventKind::ALL.len(),
        "broker topology declared"
    );
    Ok(())
}

/// AMQP topic matching: words are `.`-separated, `*` matches exactly one word,
/// `#` matches zero or more words.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && match_words(rest, &key[1..]),
    }
}
