/// Broker client error variants.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker unreachable: {0}")]
    Connection(String),
    #[error("channel closed")]
    ChannelClosed,
    #[error("declaration failed: {0}")]
    Declare(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("consume failed: {0}")]
    Consume(String),
    #[error("acknowledgement failed: {0}")]
    Ack(String),
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrokerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "CONNECTION",
            Self::ChannelClosed => "CHANNEL_CLOSED",
            Self::Declare(_) => "DECLARE",
            Self::Publish(_) => "PUBLISH",
            Self::Consume(_) => "CONSUME",
            Self::Ack(_) => "ACK",
            Self::Serialization(_) => "SERIALIZATION",
        }
    }

    /// Transport-level failures are recovered by reconnecting on the next operation.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ChannelClosed)
    }
}
