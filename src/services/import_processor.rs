//! Visit import orchestration
//!
//! A run goes through three stages:
//! 1. setup: caller identity, spreadsheet parsing, tenant lookup, import lock.
//!    Any failure here aborts the whole run with an `ImportError`.
//! 2. rows: every row is validated, resolved and inserted, strictly in order.
//!    A failing row becomes one message in the summary and the run goes on.
//! 3. bookkeeping: the run is recorded in the import history.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::identity::IdentityProvider;
use crate::services::import_history::{ImportHistory, RunOwner};
use crate::services::import_lock::ImportLocks;
use crate::services::record_store::{RecordStore, StoreError, APPLICATION_CODE_CONSTRAINT};
use crate::services::resolver::{resolve_row, Resolution};
use crate::services::spreadsheet::{parse_spreadsheet, SpreadsheetError};
use crate::services::validator::validate_row;
use crate::types::{
    ImportRow, ImportSummary, NewScheduledVisit, ResolvedEntities, TenantScope, ValidatedRow, VisitStatus,
};

/// Default cap on data rows per file
pub const DEFAULT_MAX_ROWS: usize = 5_000;

/// Attempts at finding a free application code before giving up on a row
const MAX_CODE_ATTEMPTS: usize = 3;

/// Produces application codes
pub type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// `APP-` followed by a random five digit number
pub fn generate_application_code() -> String {
    format!("APP-{}", rand::thread_rng().gen_range(10_000..=99_999))
}

/// Run-level failures. Nothing has been written when one of these is returned.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Oturum bulunamadı, lütfen tekrar giriş yapın")]
    Unauthenticated,
    #[error("Kimlik doğrulanamadı: {0}")]
    Identity(anyhow::Error),
    #[error("Kullanıcıya ait şirket bulunamadı")]
    CompanyNotFound,
    #[error("Dosya boş")]
    EmptyFile,
    #[error("Dosya okunamadı: {0}")]
    UnreadableFile(#[from] SpreadsheetError),
    #[error("Dosyada çok fazla satır var: {rows} (en fazla {max})")]
    TooManyRows { rows: usize, max: usize },
    #[error("Bu şirket için devam eden bir içe aktarma var")]
    AlreadyRunning,
    #[error("Veri deposuna erişilemedi: {0}")]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Error code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated | Self::Identity(_) => "UNAUTHORIZED",
            Self::CompanyNotFound => "COMPANY_NOT_FOUND",
            Self::EmptyFile => "EMPTY_FILE",
            Self::UnreadableFile(_) => "INVALID_FILE",
            Self::TooManyRows { .. } => "TOO_MANY_ROWS",
            Self::AlreadyRunning => "IMPORT_IN_PROGRESS",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

/// Uploaded spreadsheet
#[derive(Debug, Clone)]
pub struct SpreadsheetFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// What happened to one row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Imported { application_code: String },
    Rejected(String),
}

impl ImportSummary {
    fn apply(mut self, outcome: RowOutcome) -> Self {
        match outcome {
            RowOutcome::Imported { .. } => self.record_success(),
            RowOutcome::Rejected(message) => self.record_error(message),
        }
        self
    }
}

pub struct VisitImporter {
    store: Arc<dyn RecordStore>,
    history: ImportHistory,
    locks: ImportLocks,
    max_rows: usize,
    code_generator: CodeGenerator,
}

impl VisitImporter {
    pub fn new(store: Arc<dyn RecordStore>, history: ImportHistory) -> Self {
        Self {
            store,
            history,
            locks: ImportLocks::default(),
            max_rows: DEFAULT_MAX_ROWS,
            code_generator: Arc::new(generate_application_code),
        }
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_code_generator(mut self, generator: CodeGenerator) -> Self {
        self.code_generator = generator;
        self
    }

    pub fn history(&self) -> &ImportHistory {
        &self.history
    }

    pub fn locks(&self) -> &ImportLocks {
        &self.locks
    }

    /// Import a spreadsheet for the caller behind `identity`, recording the run in history.
    pub async fn run(
        &self,
        run_id: Uuid,
        file: &SpreadsheetFile,
        identity: &dyn IdentityProvider,
    ) -> Result<ImportSummary, ImportError> {
        let started_at = Utc::now();
        let mut owner = None;

        let result = self.run_stages(file, identity, &mut owner).await;

        let Some(owner) = owner else {
            if let Err(e) = &result {
                warn!("Import {} of '{}' rejected without a user: {}", run_id, file.filename, e);
            }
            return result;
        };

        match &result {
            Ok(summary) => {
                info!(
                    "Import {} of '{}' finished: {} imported, {} failed",
                    run_id, file.filename, summary.success_count, summary.error_count
                );
                self.history.record_completed(run_id, owner, &file.filename, started_at, summary.clone());
            }
            Err(ImportError::AlreadyRunning) => {
                warn!("Import {} rejected: another import is running for the company", run_id);
            }
            Err(e) => {
                warn!("Import {} of '{}' aborted: {}", run_id, file.filename, e);
                self.history.record_failed(run_id, owner, &file.filename, started_at, e.to_string());
            }
        }

        result
    }

    async fn run_stages(
        &self,
        file: &SpreadsheetFile,
        identity: &dyn IdentityProvider,
        owner: &mut Option<RunOwner>,
    ) -> Result<ImportSummary, ImportError> {
        let user_id = identity
            .current_user()
            .await
            .map_err(ImportError::Identity)?
            .ok_or(ImportError::Unauthenticated)?;
        *owner = Some(RunOwner { company_id: None, user_id });

        let rows = self.read_rows(file)?;

        let scope = self.resolve_scope(user_id).await?;
        *owner = Some(RunOwner { company_id: Some(scope.company_id), user_id });

        let _guard = self
            .locks
            .try_acquire(scope.company_id)
            .ok_or(ImportError::AlreadyRunning)?;

        info!(
            "Importing {} rows from '{}' for company {}",
            rows.len(),
            file.filename,
            scope.company_id
        );
        Ok(self.import_rows(&scope, rows).await)
    }

    /// Parse the file; an empty, unreadable or oversized file fails the run.
    fn read_rows(&self, file: &SpreadsheetFile) -> Result<Vec<ImportRow>, ImportError> {
        if file.bytes.is_empty() {
            return Err(ImportError::EmptyFile);
        }
        let rows = parse_spreadsheet(&file.filename, &file.bytes)?;
        if rows.is_empty() {
            return Err(ImportError::EmptyFile);
        }
        if rows.len() > self.max_rows {
            return Err(ImportError::TooManyRows { rows: rows.len(), max: self.max_rows });
        }
        Ok(rows)
    }

    async fn resolve_scope(&self, user_id: Uuid) -> Result<TenantScope, ImportError> {
        let company_id = self
            .store
            .company_for_user(user_id)
            .await?
            .ok_or(ImportError::CompanyNotFound)?;
        Ok(TenantScope { company_id, user_id })
    }

    /// Fold rows into a summary, one row at a time.
    pub async fn import_rows(&self, scope: &TenantScope, rows: Vec<ImportRow>) -> ImportSummary {
        stream::iter(rows)
            .fold(ImportSummary::default(), |summary, row| async move {
                let outcome = self.import_row(scope, row).await;
                summary.apply(outcome)
            })
            .await
    }

    async fn import_row(&self, scope: &TenantScope, row: ImportRow) -> RowOutcome {
        let validated = validate_row(row);
        let row_number = validated.row_number;
        if !validated.is_valid() {
            debug!("Row {} failed validation: {:?}", row_number, validated.errors);
            return RowOutcome::Rejected(validated.error_message());
        }

        let entities = match resolve_row(self.store.as_ref(), scope, &validated).await {
            Ok(Resolution::Resolved(entities)) => entities,
            Ok(unresolved) => {
                debug!("Row {} not resolved: {:?}", row_number, unresolved);
                return RowOutcome::Rejected(unresolved.failure_message(row_number).unwrap_or_default());
            }
            Err(e) => {
                warn!("Row {}: lookup failed: {}", row_number, e);
                return RowOutcome::Rejected(format!("Kayıtlar sorgulanamadı: {} (satır {})", e.message, row_number));
            }
        };

        let Some(visit) = self.build_visit(scope, &validated, &entities) else {
            return RowOutcome::Rejected(format!("Satır {}: Geçersiz tarih veya saat", row_number));
        };

        match self.insert_visit(visit).await {
            Ok(application_code) => {
                debug!(
                    "Row {}: visit {} created for {} / {}",
                    row_number, application_code, entities.customer_name, entities.branch_name
                );
                RowOutcome::Imported { application_code }
            }
            Err(e) => {
                warn!("Row {}: insert failed: {}", row_number, e);
                RowOutcome::Rejected(format!("Ziyaret kaydedilemedi: {} (satır {})", e.message, row_number))
            }
        }
    }

    fn build_visit(
        &self,
        scope: &TenantScope,
        row: &ValidatedRow,
        entities: &ResolvedEntities,
    ) -> Option<NewScheduledVisit> {
        let service_types = row
            .row
            .visit_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| vec![t.to_string()])
            .unwrap_or_default();

        Some(NewScheduledVisit {
            company_id: scope.company_id,
            customer_id: entities.customer_id,
            branch_id: entities.branch_id,
            operator_id: entities.operator_id,
            application_code: (self.code_generator)(),
            scheduled_date: row.scheduled_date?,
            scheduled_time: row.scheduled_time?,
            service_types,
            notes: row.row.notes.clone(),
            status: VisitStatus::Scheduled,
            created_by: scope.user_id,
        })
    }

    /// Insert, drawing a new application code when the current one is taken.
    async fn insert_visit(&self, mut visit: NewScheduledVisit) -> Result<String, StoreError> {
        let mut attempt = 1;
        loop {
            match self.store.insert_scheduled_visit(&visit).await {
                Ok(_) => return Ok(visit.application_code),
                Err(e) if e.violates(APPLICATION_CODE_CONSTRAINT) && attempt < MAX_CODE_ATTEMPTS => {
                    debug!("Application code {} already used, drawing another", visit.application_code);
                    visit.application_code = (self.code_generator)();
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
