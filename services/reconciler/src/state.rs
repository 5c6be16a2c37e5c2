use std::path::PathBuf;

use sea_orm::DatabaseConnection;

use crate::infra::db::{DbAssetSource, DbReportRepository};
use crate::infra::expected_file::FsExpectedListReader;
use crate::usecase::run::RunReconciliationUseCase;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    /// Used when a run request carries no expected list.
    pub expected_inventory_path: PathBuf,
}

impl AppState {
    pub fn report_repo(&self) -> DbReportRepository {
        DbReportRepository {
            db: self.db.clone(),
        }
    }

    pub fn run_usecase(
        &self,
    ) -> RunReconciliationUseCase<DbAssetSource, FsExpectedListReader, DbReportRepository> {
        RunReconciliationUseCase {
            assets: DbAssetSource {
                db: self.db.clone(),
            },
            files: FsExpectedListReader,
            reports: self.report_repo(),
            default_path: self.expected_inventory_path.clone(),
        }
    }
}
