//! Import types for spreadsheet visit import

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ROWS
// =============================================================================

/// One spreadsheet line, as read by the parser.
///
/// Every cell is trimmed text; blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    /// Line in the source sheet, header is line 1
    pub line: usize,
    pub customer_code: Option<String>,
    pub customer_name: Option<String>,
    pub branch_code: Option<String>,
    pub branch_name: Option<String>,
    pub operator: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub visit_type: Option<String>,
    pub notes: Option<String>,
}

/// A row after validation. `errors` empty means the row may be resolved.
#[derive(Debug, Clone)]
pub struct ValidatedRow {
    /// 1-based display row number (header is row 1)
    pub row_number: usize,
    pub row: ImportRow,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub errors: Vec<String>,
}

impl ValidatedRow {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All validation errors of the row as one message.
    pub fn error_message(&self) -> String {
        self.errors.join("; ")
    }
}

/// Store identifiers a row resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntities {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub branch_id: Uuid,
    pub branch_name: String,
    pub operator_id: Option<Uuid>,
}

/// Tenant a run is restricted to, derived once per run from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    pub company_id: Uuid,
    pub user_id: Uuid,
}

// =============================================================================
// SUMMARY
// =============================================================================

/// Aggregate result of one import run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub success_count: u32,
    pub error_count: u32,
    pub error_messages: Vec<String>,
}

impl ImportSummary {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error_count += 1;
        self.error_messages.push(message.into());
    }

    /// User-facing notifications: success count, error count, then one per error.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut out = Vec::with_capacity(self.error_messages.len() + 2);
        if self.success_count > 0 {
            out.push(Notification::success(format!(
                "{} ziyaret başarıyla içe aktarıldı",
                self.success_count
            )));
        }
        if self.error_count > 0 {
            out.push(Notification::error(format!(
                "{} satır içe aktarılamadı",
                self.error_count
            )));
        }
        out.extend(self.error_messages.iter().cloned().map(Notification::error));
        out
    }
}

/// Notification level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A single toast-style message for the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Error, message: message.into() }
    }
}

// =============================================================================
// NATS PAYLOADS
// =============================================================================

/// Request to import a spreadsheet of scheduled visits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitImportRequest {
    pub filename: String,
    /// Spreadsheet file content, base64 encoded
    pub content_base64: String,
}

/// Reply to a visit import request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitImportResponse {
    pub run_id: Uuid,
    pub summary: ImportSummary,
    pub notifications: Vec<Notification>,
}

/// Request for recent import runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistoryRequest {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_and_messages() {
        let mut summary = ImportSummary::default();
        summary.record_success();
        summary.record_success();
        summary.record_error("Satır 4: Ziyaret tarihi zorunludur");

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.error_messages, vec!["Satır 4: Ziyaret tarihi zorunludur"]);
    }

    #[test]
    fn notifications_order_success_then_count_then_each_error() {
        let summary = ImportSummary {
            success_count: 1,
            error_count: 2,
            error_messages: vec!["a".to_string(), "b".to_string()],
        };

        let notes = summary.notifications();
        assert_eq!(notes.len(), 4);
        assert_eq!(notes[0].level, NotificationLevel::Success);
        assert_eq!(notes[0].message, "1 ziyaret başarıyla içe aktarıldı");
        assert_eq!(notes[1].message, "2 satır içe aktarılamadı");
        assert_eq!(notes[2], Notification::error("a"));
        assert_eq!(notes[3], Notification::error("b"));
    }

    #[test]
    fn notifications_skip_zero_counts() {
        let summary = ImportSummary { success_count: 3, ..Default::default() };
        let notes = summary.notifications();
        assert_eq!(notes, vec![Notification::success("3 ziyaret başarıyla içe aktarıldı")]);
    }

    #[test]
    fn summary_serializes_camel_case() {
        let summary = ImportSummary {
            success_count: 1,
            error_count: 0,
            error_messages: vec![],
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["successCount"], 1);
        assert_eq!(json["errorCount"], 0);
        assert!(json["errorMessages"].as_array().unwrap().is_empty());
    }

    #[test]
    fn import_request_deserializes() {
        let json = r#"{"filename":"ziyaretler.xlsx","contentBase64":"AAEC"}"#;
        let req: VisitImportRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.filename, "ziyaretler.xlsx");
        assert_eq!(req.content_base64, "AAEC");
    }

    #[test]
    fn history_request_defaults_limit() {
        let req: ImportHistoryRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.limit, 20);
    }
}
