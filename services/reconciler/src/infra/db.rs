use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use serde_json::Value;

use stockroom_domain::asset::{AssetSnapshot, AssetStatus};
use stockroom_domain::pagination::PageRequest;
use stockroom_reconciler_schema::{assets, audit_events, recon_reports};

use crate::domain::repository::{AssetSource, ReportRepository};
use crate::domain::types::{AuditEvent, Discrepancy, RECON_DIFF_EVENT, ReconReport, ReportStatus};
use crate::error::ReconcilerError;

// ── Asset source ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAssetSource {
    pub db: DatabaseConnection,
}

impl AssetSource for DbAssetSource {
    async fn list_assets(&self) -> Result<Vec<AssetSnapshot>, ReconcilerError> {
        let models = assets::Entity::find()
            .order_by_asc(assets::Column::Id)
            .all(&self.db)
            .await
            .context("list assets")?;
        Ok(models.into_iter().map(snapshot_from_model).collect())
    }
}

fn snapshot_from_model(model: assets::Model) -> AssetSnapshot {
    AssetSnapshot {
        id: Some(model.id),
        asset_id: Some(model.asset_id),
        name: model.name,
        category: Some(model.category),
        status: AssetStatus::parse(&model.status),
        in_warehouse: Some(model.in_warehouse),
        qr_code: Some(model.qr_code),
        created_at: Some(model.created_at.and_utc()),
        updated_at: Some(model.updated_at.and_utc()),
        ..AssetSnapshot::default()
    }
}

// ── Report repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbReportRepository {
    pub db: DatabaseConnection,
}

impl ReportRepository for DbReportRepository {
    async fn record_run(
        &self,
        run_at: DateTime<Utc>,
        status: ReportStatus,
        diff: &[Discrepancy],
    ) -> Result<ReconReport, ReconcilerError> {
        let diff_json = serde_json::to_value(diff).context("serialize discrepancies")?;
        let payloads = diff
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .context("serialize audit payloads")?;

        let model = self
            .db
            .transaction::<_, recon_reports::Model, sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    let report = recon_reports::ActiveModel {
                        run_at: Set(run_at),
                        diff: Set(Some(diff_json)),
                        status: Set(status.as_str().to_owned()),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    if !payloads.is_empty() {
                        audit_events::Entity::insert_many(payloads.into_iter().map(|payload| {
                            audit_events::ActiveModel {
                                event_type: Set(RECON_DIFF_EVENT.to_owned()),
                                payload: Set(Some(payload)),
                                created_at: Set(run_at),
                                ..Default::default()
                            }
                        }))
                        .exec(txn)
                        .await?;
                    }
                    Ok(report)
                })
            })
            .await
            .context("record reconciliation run")?;
        report_from_model(model)
    }

    async fn list_reports(&self, page: PageRequest) -> Result<Vec<ReconReport>, ReconcilerError> {
        let models = recon_reports::Entity::find()
            .order_by_desc(recon_reports::Column::RunAt)
            .order_by_desc(recon_reports::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .context("list recon reports")?;
        models.into_iter().map(report_from_model).collect()
    }

    async fn list_audit_events(
        &self,
        event_type: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<AuditEvent>, ReconcilerError> {
        let mut query = audit_events::Entity::find();
        if let Some(event_type) = event_type {
            query = query.filter(audit_events::Column::EventType.eq(event_type));
        }
        let models = query
            .order_by_desc(audit_events::Column::CreatedAt)
            .order_by_desc(audit_events::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .context("list audit events")?;
        Ok(models
            .into_iter()
            .map(|m| AuditEvent {
                id: m.id,
                event_type: m.event_type,
                payload: m.payload,
                created_at: m.created_at,
            })
            .collect())
    }
}

fn report_from_model(model: recon_reports::Model) -> Result<ReconReport, ReconcilerError> {
    let status = ReportStatus::parse(&model.status)
        .with_context(|| format!("unknown report status {:?}", model.status))?;
    Ok(ReconReport {
        id: model.id,
        run_at: model.run_at,
        status,
        diff: model.diff.unwrap_or_else(|| Value::Array(Vec::new())),
    })
}
