use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::diff::diff_inventory;
use crate::domain::repository::{AssetSource, ExpectedListReader, ReportRepository};
use crate::domain::types::{ExpectedItem, ReconciliationRun, ReportStatus};
use crate::error::ReconcilerError;

/// Where the expected-inventory list of a run comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedSource {
    /// Passed by the caller, e.g. an admin request body.
    Inline(Vec<ExpectedItem>),
    /// A file the caller named. It must exist.
    File(PathBuf),
    /// The configured default file, if it exists.
    Default,
}

pub struct RunReconciliationUseCase<A: AssetSource, F: ExpectedListReader, R: ReportRepository> {
    pub assets: A,
    pub files: F,
    pub reports: R,
    pub default_path: PathBuf,
}

impl<A, F, R> RunReconciliationUseCase<A, F, R>
where
    A: AssetSource,
    F: ExpectedListReader,
    R: ReportRepository,
{
    /// Diff the expected list against the store and persist the report with its audit trail.
    ///
    /// Without any expected list the run records an `ok` report with no discrepancies. Any
    /// read or parse failure aborts before anything is written.
    pub async fn execute(
        &self,
        source: ExpectedSource,
    ) -> Result<ReconciliationRun, ReconcilerError> {
        let run_at = Utc::now();
        let expected = self.expected_list(source).await?;

        let diff = match expected {
            Some(expected) => {
                let current = self.assets.list_assets().await?;
                let diff = diff_inventory(&expected, &current);
                info!(
                    expected = expected.len(),
                    current = current.len(),
                    discrepancies = diff.len(),
                    "inventory compared"
                );
                diff
            }
            None => {
                info!("no expected inventory list, skipping diff");
                Vec::new()
            }
        };

        let status = ReportStatus::from_diff(&diff);
        let report = self.reports.record_run(run_at, status, &diff).await?;
        if status == ReportStatus::Anomalies {
            warn!(
                report_id = report.id,
                discrepancies = diff.len(),
                "reconciliation found anomalies"
            );
        } else {
            info!(report_id = report.id, "reconciliation ok");
        }
        Ok(ReconciliationRun {
            report,
            discrepancies: diff,
        })
    }

    async fn expected_list(
        &self,
        source: ExpectedSource,
    ) -> Result<Option<Vec<ExpectedItem>>, ReconcilerError> {
        match source {
            ExpectedSource::Inline(items) => Ok(Some(items)),
            ExpectedSource::File(path) => match self.files.read(&path).await? {
                Some(items) => Ok(Some(items)),
                None => Err(ReconcilerError::ExpectedList(format!(
                    "{}: file not found",
                    path.display()
                ))),
            },
            ExpectedSource::Default => self.files.read(&self.default_path).await,
        }
    }
}
