use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info};

use stockroom_domain::event::{
    AssetEvent, DomainEvent, EventKind, NotificationEvent, Severity, WarehouseEvent,
};
use stockroom_domain::id::MessageId;

use crate::domain::repository::{DeliveryPort, NotificationRepository};
use crate::domain::severity;
use crate::domain::template::{LOW_STOCK_ALERT, MessageTemplate, TemplateRegistry};
use crate::domain::types::{
    DEFAULT_MAX_ATTEMPTS, DeliveryKind, LOW_STOCK_MAX_ATTEMPTS, LOW_STOCK_THRESHOLD,
    NewNotification, NotificationRecord,
};
use crate::error::NotifierError;
use crate::usecase::deliver::{DeliverUseCase, DeliveryOutcome};

const SYSTEM_RECIPIENT: &str = "system";

#[derive(Debug, Clone)]
pub struct NotifySettings {
    /// Recipient of asset notifications and low-stock alerts.
    pub admin_recipient: String,
    pub warehouse_recipient: String,
    pub default_max_attempts: u32,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            admin_recipient: "admin@inventory.local".to_owned(),
            warehouse_recipient: "warehouse@inventory.local".to_owned(),
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// One notification created for an inbound event, and how its first attempt went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub message_id: MessageId,
    pub outcome: DeliveryOutcome,
}

// ── Notify ───────────────────────────────────────────────────────────────────

/// Turns one inbound event into zero or more persisted notifications and attempts each once.
pub struct NotifyUseCase<R: NotificationRepository, D: DeliveryPort> {
    pub deliver: DeliverUseCase<R, D>,
    pub templates: Arc<TemplateRegistry>,
    pub settings: NotifySettings,
}

impl<R: NotificationRepository, D: DeliveryPort> NotifyUseCase<R, D> {
    pub async fn execute(&self, event: DomainEvent) -> Result<Vec<Dispatched>, NotifierError> {
        match event {
            DomainEvent::Asset(e) => self.handle_asset_event(&e).await,
            DomainEvent::Warehouse(e) => self.handle_warehouse_event(&e).await,
            DomainEvent::NotificationRequested(e) => self
                .handle_notification_request(&e)
                .await
                .map(|d| vec![d]),
        }
    }

    pub async fn handle_asset_event(
        &self,
        event: &AssetEvent,
    ) -> Result<Vec<Dispatched>, NotifierError> {
        let event_type = event.action.kind().as_str();
        self.deliver.metrics.record_processed(event_type);
        debug!(event_id = %event.id.0, event_type, asset_id = %event.asset_id, "processing asset event");

        let Some(template) = self.template(event_type) else {
            return Ok(Vec::new());
        };
        let context = asset_context(event)?;
        let notification = NewNotification {
            kind: DeliveryKind::Internal,
            severity: severity::resolve(event_type, event.severity),
            recipient: self.settings.admin_recipient.clone(),
            subject: Some(template.subject.render(&context)),
            message: template.text_body.render(&context),
            template_data: Some(Value::Object(context)),
            max_attempts: self.settings.default_max_attempts,
        };
        Ok(vec![self.dispatch(notification).await?])
    }

    /// Standard warehouse notification, plus a low-stock e-mail alert when utilization is
    /// above the threshold. The alert does not depend on the standard template being present.
    pub async fn handle_warehouse_event(
        &self,
        event: &WarehouseEvent,
    ) -> Result<Vec<Dispatched>, NotifierError> {
        let event_type = event.action.kind().as_str();
        self.deliver.metrics.record_processed(event_type);
        debug!(event_id = %event.id.0, event_type, warehouse_id = %event.warehouse_id, "processing warehouse event");

        let context = warehouse_context(event)?;
        let mut dispatched = Vec::new();

        if event.warehouse.exceeds(LOW_STOCK_THRESHOLD) {
            if let Some(template) = self.template(LOW_STOCK_ALERT) {
                let notification = NewNotification {
                    kind: DeliveryKind::Email,
                    severity: Severity::Warning,
                    recipient: self.settings.admin_recipient.clone(),
                    subject: Some(template.subject.render(&context)),
                    message: template.html_body.render(&context),
                    template_data: Some(Value::Object(context.clone())),
                    max_attempts: LOW_STOCK_MAX_ATTEMPTS,
                };
                let alert = self.dispatch(notification).await?;
                info!(
                    message_id = %alert.message_id,
                    warehouse_id = %event.warehouse_id,
                    current_count = event.warehouse.current_count,
                    max_capacity = event.warehouse.max_capacity,
                    "low-stock alert raised"
                );
                dispatched.push(alert);
            }
        }

        if let Some(template) = self.template(event_type) {
            let notification = NewNotification {
                kind: DeliveryKind::Internal,
                severity: event.severity.unwrap_or(Severity::Info),
                recipient: self.settings.warehouse_recipient.clone(),
                subject: Some(template.subject.render(&context)),
                message: template.text_body.render(&context),
                template_data: Some(Value::Object(context)),
                max_attempts: self.settings.default_max_attempts,
            };
            dispatched.push(self.dispatch(notification).await?);
        }
        Ok(dispatched)
    }

    /// Direct requests carry their own text; nothing is templated.
    pub async fn handle_notification_request(
        &self,
        event: &NotificationEvent,
    ) -> Result<Dispatched, NotifierError> {
        self.deliver
            .metrics
            .record_processed(EventKind::NotificationRequested.as_str());
        let template_data =
            serde_json::to_value(event).map_err(|e| NotifierError::Internal(e.into()))?;
        let notification = NewNotification {
            kind: DeliveryKind::Internal,
            severity: event.severity,
            recipient: event
                .user_id
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| SYSTEM_RECIPIENT.to_owned()),
            subject: Some(event.title.clone()),
            message: event.message.clone(),
            template_data: Some(template_data),
            max_attempts: self.settings.default_max_attempts,
        };
        self.dispatch(notification).await
    }

    fn template(&self, event_type: &str) -> Option<&MessageTemplate> {
        let template = self.templates.get(event_type);
        if template.is_none() {
            info!(event_type, "no template registered, event dropped");
        }
        template
    }

    async fn dispatch(&self, notification: NewNotification) -> Result<Dispatched, NotifierError> {
        let record = NotificationRecord::create(notification, Utc::now());
        self.deliver.repo.insert(&record).await?;
        let outcome = self.deliver.execute(&record).await?;
        Ok(Dispatched {
            message_id: record.message_id,
            outcome,
        })
    }
}

// ── Render context ───────────────────────────────────────────────────────────

fn to_object<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>, NotifierError> {
    match serde_json::to_value(value).map_err(|e| NotifierError::Internal(e.into()))? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn timestamp(at: &chrono::DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Snapshot fields plus `assetId`, `action` and `timestamp` from the envelope.
pub fn asset_context(event: &AssetEvent) -> Result<Map<String, Value>, NotifierError> {
    let mut context = to_object(&event.asset)?;
    context
        .entry("assetId")
        .or_insert_with(|| Value::String(event.asset_id.clone()));
    context.insert(
        "action".to_owned(),
        Value::String(event.action.kind().as_str().to_owned()),
    );
    context.insert("timestamp".to_owned(), timestamp(&event.timestamp));
    Ok(context)
}

/// Snapshot fields plus `warehouseId`, `warehouseName`, `utilizationPercent` (one decimal),
/// `action` and `timestamp`.
pub fn warehouse_context(event: &WarehouseEvent) -> Result<Map<String, Value>, NotifierError> {
    let mut context = to_object(&event.warehouse)?;
    context.insert(
        "warehouseId".to_owned(),
        Value::String(event.warehouse_id.clone()),
    );
    context.insert(
        "warehouseName".to_owned(),
        Value::String(event.warehouse.name.clone()),
    );
    if let Some(utilization) = event.warehouse.utilization() {
        context.insert(
            "utilizationPercent".to_owned(),
            Value::String(format!("{:.1}", utilization * 100.0)),
        );
    }
    context.insert(
        "action".to_owned(),
        Value::String(event.action.kind().as_str().to_owned()),
    );
    context.insert("timestamp".to_owned(), timestamp(&event.timestamp));
    Ok(context)
}
