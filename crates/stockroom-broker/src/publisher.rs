use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use stockroom_domain::asset::AssetSnapshot;
use stockroom_domain::event::{
    AssetAction, AssetEvent, DomainEvent, NotificationEvent, Severity, WarehouseAction,
    WarehouseEvent,
};
use stockroom_domain::id::EventId;
use stockroom_domain::warehouse::WarehouseSnapshot;

use crate::client::BrokerClient;
use crate::error::BrokerError;
use crate::transport::Transport;

/// Typed front for publishing domain events onto the fixed routing table.
///
/// Call after the originating mutation has committed. Errors are returned to the caller,
/// which decides whether to fail its request or only log.
pub struct EventPublisher<T: Transport> {
    broker: Arc<BrokerClient<T>>,
}

impl<T: Transport> Clone for EventPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<T: Transport> EventPublisher<T> {
    pub fn new(broker: Arc<BrokerClient<T>>) -> Self {
        Self { broker }
    }

    pub async fn publish(&self, event: &DomainEvent) -> Result<bool, BrokerError> {
        let kind = event.kind();
        let payload = event.payload()?;
        let accepted = self
            .broker
            .publish(kind.exchange(), kind.routing_key(), &payload)
            .await?;
        debug!(event_id = %event.id(), event_type = kind.as_str(), "event published");
        Ok(accepted)
    }

    pub async fn publish_asset_event(
        &self,
        action: AssetAction,
        asset_id: &str,
        asset: AssetSnapshot,
        user_id: Option<String>,
    ) -> Result<bool, BrokerError> {
        let event = AssetEvent {
            id: EventId::new(action.kind().as_str(), asset_id),
            action,
            asset_id: asset_id.to_owned(),
            asset,
            user_id,
            severity: None,
            timestamp: Utc::now(),
        };
        self.publish(&DomainEvent::Asset(event)).await
    }

    pub async fn publish_warehouse_event(
        &self,
        action: WarehouseAction,
        warehouse_id: &str,
        warehouse: WarehouseSnapshot,
        user_id: Option<String>,
    ) -> Result<bool, BrokerError> {
        let event = WarehouseEvent {
            id: EventId::new(action.kind().as_str(), warehouse_id),
            action,
            warehouse_id: warehouse_id.to_owned(),
            warehouse,
            user_id,
            severity: None,
            timestamp: Utc::now(),
        };
        self.publish(&DomainEvent::Warehouse(event)).await
    }

    pub async fn publish_notification_event(
        &self,
        severity: Severity,
        title: &str,
        message: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<bool, BrokerError> {
        let event = NotificationEvent {
            id: EventId::new("notification", severity.as_str()),
            severity,
            title: title.to_owned(),
            message: message.to_owned(),
            user_id: None,
            metadata,
            timestamp: Utc::now(),
        };
        self.publish(&DomainEvent::NotificationRequested(event)).await
    }
}
