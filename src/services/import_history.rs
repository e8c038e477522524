//! Import run history
//!
//! Keeps the most recent import runs in memory and mirrors them to a JSON
//! file so history survives worker restarts.
//!
//! Runs are grouped by owner: the company when it is known, otherwise the
//! user who started the run. Each owner keeps at most `MAX_HISTORY_SIZE` runs,
//! so one tenant's activity never evicts another's. Runs without an
//! authenticated user are not recorded.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::types::ImportSummary;

const MAX_HISTORY_SIZE: usize = 100;

/// Final state of an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportRunStatus {
    Completed,
    Failed,
}

/// One finished import run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRunEntry {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub user_id: Uuid,
    pub filename: String,
    pub status: ImportRunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ImportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportRunEntry {
    fn owner_key(&self) -> OwnerKey {
        match self.company_id {
            Some(company_id) => OwnerKey::Company(company_id),
            None => OwnerKey::User(self.user_id),
        }
    }
}

/// Response for listing import history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistoryResponse {
    pub runs: Vec<ImportRunEntry>,
    pub total: usize,
    pub in_progress: bool,
}

/// Who ran an import. The company is unknown when the run failed before the
/// tenant lookup.
#[derive(Debug, Clone, Copy)]
pub struct RunOwner {
    pub company_id: Option<Uuid>,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum OwnerKey {
    Company(Uuid),
    User(Uuid),
}

/// Import history backed by per-owner in-memory deques + JSON file on disk.
#[derive(Clone)]
pub struct ImportHistory {
    runs: Arc<RwLock<HashMap<OwnerKey, VecDeque<ImportRunEntry>>>>,
    path: Option<PathBuf>,
}

impl ImportHistory {
    /// History persisted at `path`, loading any existing entries.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let history = Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            path: Some(path.clone()),
        };
        if let Some(mut loaded) = Self::load_from_disk(&path) {
            loaded.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            let count = loaded.len();
            let mut runs = history.runs.write();
            for entry in loaded {
                let bucket = runs.entry(entry.owner_key()).or_default();
                if bucket.len() < MAX_HISTORY_SIZE {
                    bucket.push_back(entry);
                }
            }
            drop(runs);
            info!("Loaded {} import history entries from {}", count, path.display());
        }
        history
    }

    /// History kept in memory only
    pub fn in_memory() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            path: None,
        }
    }

    pub fn record_completed(
        &self,
        id: Uuid,
        owner: RunOwner,
        filename: &str,
        started_at: DateTime<Utc>,
        summary: ImportSummary,
    ) {
        self.add_entry(Self::entry(id, owner, filename, started_at, ImportRunStatus::Completed, Some(summary), None));
    }

    pub fn record_failed(
        &self,
        id: Uuid,
        owner: RunOwner,
        filename: &str,
        started_at: DateTime<Utc>,
        error: String,
    ) {
        self.add_entry(Self::entry(id, owner, filename, started_at, ImportRunStatus::Failed, None, Some(error)));
    }

    fn entry(
        id: Uuid,
        owner: RunOwner,
        filename: &str,
        started_at: DateTime<Utc>,
        status: ImportRunStatus,
        summary: Option<ImportSummary>,
        error: Option<String>,
    ) -> ImportRunEntry {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
        ImportRunEntry {
            id,
            company_id: owner.company_id,
            user_id: owner.user_id,
            filename: filename.to_string(),
            status,
            started_at,
            completed_at,
            duration_ms,
            summary,
            error,
        }
    }

    fn add_entry(&self, entry: ImportRunEntry) {
        let mut runs = self.runs.write();

        let bucket = runs.entry(entry.owner_key()).or_default();
        if bucket.len() >= MAX_HISTORY_SIZE {
            bucket.pop_back();
        }
        bucket.push_front(entry);

        if let Some(path) = &self.path {
            Self::save_to_disk(path, &runs);
        }
    }

    /// Most recent runs visible to a user of `company_id`, newest first: the
    /// company's runs plus the user's own runs that failed before the company
    /// was known.
    pub fn recent_for(&self, company_id: Uuid, user_id: Uuid, limit: usize) -> Vec<ImportRunEntry> {
        let runs = self.runs.read();
        let mut visible: Vec<ImportRunEntry> = [OwnerKey::Company(company_id), OwnerKey::User(user_id)]
            .iter()
            .filter_map(|key| runs.get(key))
            .flat_map(|bucket| bucket.iter().cloned())
            .collect();
        visible.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        visible.truncate(limit);
        visible
    }

    fn load_from_disk(path: &Path) -> Option<Vec<ImportRunEntry>> {
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Vec<ImportRunEntry>>(&content) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!("Failed to parse import history file: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read import history file: {}", e);
                None
            }
        }
    }

    fn save_to_disk(path: &Path, runs: &HashMap<OwnerKey, VecDeque<ImportRunEntry>>) {
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("Failed to create import history directory: {}", e);
                return;
            }
        }
        let entries: Vec<&ImportRunEntry> = runs.values().flatten().collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    warn!("Failed to write import history file: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize import history: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn owner(company_id: Uuid) -> RunOwner {
        RunOwner { company_id: Some(company_id), user_id: Uuid::new_v4() }
    }

    #[test]
    fn test_record_completed_run() {
        let history = ImportHistory::in_memory();
        let company = Uuid::new_v4();
        let summary = ImportSummary { success_count: 3, error_count: 0, error_messages: vec![] };

        history.record_completed(Uuid::new_v4(), owner(company), "mart.xlsx", Utc::now(), summary.clone());

        let runs = history.recent_for(company, Uuid::new_v4(), 10);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, ImportRunStatus::Completed);
        assert_eq!(runs[0].summary, Some(summary));
        assert!(runs[0].error.is_none());
    }

    #[test]
    fn test_record_failed_run() {
        let history = ImportHistory::in_memory();
        let company = Uuid::new_v4();

        history.record_failed(Uuid::new_v4(), owner(company), "bos.csv", Utc::now(), "Dosya boş".to_string());

        let runs = history.recent_for(company, Uuid::new_v4(), 10);
        assert_eq!(runs[0].status, ImportRunStatus::Failed);
        assert_eq!(runs[0].error.as_deref(), Some("Dosya boş"));
    }

    #[test]
    fn test_history_is_tenant_scoped_and_newest_first() {
        let history = ImportHistory::in_memory();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let t0 = Utc::now();

        history.record_failed(Uuid::new_v4(), owner(mine), "1.csv", t0, "x".to_string());
        history.record_failed(Uuid::new_v4(), owner(theirs), "2.csv", t0 + Duration::seconds(1), "x".to_string());
        history.record_failed(Uuid::new_v4(), owner(mine), "3.csv", t0 + Duration::seconds(2), "x".to_string());

        let runs = history.recent_for(mine, Uuid::new_v4(), 10);
        let names: Vec<&str> = runs.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["3.csv", "1.csv"]);
    }

    #[test]
    fn test_user_runs_without_company_visible_only_to_that_user() {
        let history = ImportHistory::in_memory();
        let company = Uuid::new_v4();
        let user = Uuid::new_v4();
        let t0 = Utc::now();

        history.record_completed(Uuid::new_v4(), RunOwner { company_id: Some(company), user_id: user }, "a.csv", t0, ImportSummary::default());
        history.record_failed(Uuid::new_v4(), RunOwner { company_id: None, user_id: user }, "bozuk.xlsx", t0 + Duration::seconds(1), "Dosya okunamadı".to_string());

        let own: Vec<String> = history.recent_for(company, user, 10).into_iter().map(|r| r.filename).collect();
        assert_eq!(own, vec!["bozuk.xlsx".to_string(), "a.csv".to_string()]);

        let colleague = history.recent_for(company, Uuid::new_v4(), 10);
        assert_eq!(colleague.len(), 1);
    }

    #[test]
    fn test_history_capped_per_owner() {
        let history = ImportHistory::in_memory();
        let company = Uuid::new_v4();
        let busy = Uuid::new_v4();

        history.record_completed(Uuid::new_v4(), owner(company), "kept.csv", Utc::now(), ImportSummary::default());
        for i in 0..(MAX_HISTORY_SIZE + 5) {
            history.record_failed(Uuid::new_v4(), owner(busy), &format!("{}.csv", i), Utc::now(), "x".to_string());
        }

        assert_eq!(history.recent_for(busy, Uuid::new_v4(), usize::MAX).len(), MAX_HISTORY_SIZE);
        let kept = history.recent_for(company, Uuid::new_v4(), 10);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].filename, "kept.csv");
    }

    #[test]
    fn test_history_persists_to_file() {
        let dir = std::env::temp_dir().join(format!("pestdesk-history-{}", Uuid::new_v4()));
        let path = dir.join("import-history.json");
        let company = Uuid::new_v4();
        let user = Uuid::new_v4();

        let history = ImportHistory::load(&path);
        history.record_failed(Uuid::new_v4(), RunOwner { company_id: Some(company), user_id: user }, "a.csv", Utc::now(), "x".to_string());
        history.record_failed(Uuid::new_v4(), RunOwner { company_id: None, user_id: user }, "b.csv", Utc::now(), "x".to_string());

        let reloaded = ImportHistory::load(&path);
        assert_eq!(reloaded.recent_for(company, user, 10).len(), 2);

        let _ = std::fs::remove_dir_all(dir);
    }
}
