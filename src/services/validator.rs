//! Row validation for visit import
//!
//! Validation never fails: every problem becomes a message on the returned
//! `ValidatedRow`, tagged with the row's line in the source sheet.

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::types::{ImportRow, ValidatedRow};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%H.%M"];

/// Parse a visit date. The year must be written with four digits.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .filter(|date| date.year() >= 1000)
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Validate one row. Messages carry `row.line`.
pub fn validate_row(row: ImportRow) -> ValidatedRow {
    let row_number = row.line;
    let mut errors = Vec::new();
    let mut error = |message: &str| errors.push(format!("Satır {}: {}", row_number, message));

    if present(&row.customer_code).is_none() && present(&row.customer_name).is_none() {
        error("Müşteri kodu veya müşteri adı zorunludur");
    }

    if present(&row.branch_code).is_none() && present(&row.branch_name).is_none() {
        error("Şube kodu veya şube adı zorunludur");
    }

    let scheduled_date = match present(&row.date) {
        None => {
            error("Ziyaret tarihi zorunludur");
            None
        }
        Some(raw) => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                error(&format!("Geçersiz tarih formatı: {} (beklenen GG.AA.YYYY veya YYYY-AA-GG)", raw));
            }
            parsed
        }
    };

    let scheduled_time = match present(&row.time) {
        None => {
            error("Ziyaret saati zorunludur");
            None
        }
        Some(raw) => {
            let parsed = parse_time(raw);
            if parsed.is_none() {
                error(&format!("Geçersiz saat formatı: {} (beklenen SS:DD)", raw));
            }
            parsed
        }
    };

    ValidatedRow {
        row_number,
        row,
        scheduled_date,
        scheduled_time,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_row() -> ImportRow {
        ImportRow {
            line: 2,
            customer_name: Some("Acme Gıda".to_string()),
            branch_name: Some("Merkez".to_string()),
            date: Some("2025-03-14".to_string()),
            time: Some("10:30".to_string()),
            visit_type: Some("İlaçlama".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14);
        assert_eq!(parse_date("2025-03-14"), expected);
        assert_eq!(parse_date("14.03.2025"), expected);
        assert_eq!(parse_date("14/03/2025"), expected);
        assert_eq!(parse_date(" 14.03.2025 "), expected);
        assert_eq!(parse_date("2025-02-30"), None);
        assert_eq!(parse_date("yarın"), None);
    }

    #[test]
    fn test_two_digit_year_rejected() {
        assert_eq!(parse_date("14.03.25"), None);
        assert_eq!(parse_date("14/03/25"), None);
        assert_eq!(parse_date("25-03-14"), None);

        let validated = validate_row(ImportRow { date: Some("14.03.25".to_string()), ..valid_row() });
        assert_eq!(
            validated.errors,
            vec!["Satır 2: Geçersiz tarih formatı: 14.03.25 (beklenen GG.AA.YYYY veya YYYY-AA-GG)".to_string()]
        );
        assert!(validated.scheduled_date.is_none());
    }

    #[test]
    fn test_parse_time_formats() {
        let expected = NaiveTime::from_hms_opt(9, 5, 0);
        assert_eq!(parse_time("09:05"), expected);
        assert_eq!(parse_time("09:05:00"), expected);
        assert_eq!(parse_time("09.05"), expected);
        assert_eq!(parse_time("25:00"), None);
    }

    #[test]
    fn test_valid_row_has_no_errors() {
        let validated = validate_row(valid_row());
        assert!(validated.is_valid());
        assert_eq!(validated.row_number, 2);
        assert_eq!(validated.scheduled_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(validated.scheduled_time, NaiveTime::from_hms_opt(10, 30, 0));
    }

    #[test]
    fn test_customer_code_alone_is_enough() {
        let row = ImportRow {
            customer_name: None,
            customer_code: Some("C-1".to_string()),
            ..valid_row()
        };
        assert!(validate_row(row).is_valid());
    }

    #[test]
    fn test_missing_customer_and_branch() {
        let row = ImportRow {
            line: 4,
            customer_name: Some("   ".to_string()),
            branch_name: None,
            ..valid_row()
        };
        let validated = validate_row(row);
        assert_eq!(
            validated.errors,
            vec![
                "Satır 4: Müşteri kodu veya müşteri adı zorunludur".to_string(),
                "Satır 4: Şube kodu veya şube adı zorunludur".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_and_malformed_date_are_distinct() {
        let missing = validate_row(ImportRow { date: None, ..valid_row() });
        let malformed = validate_row(ImportRow { date: Some("31.02.2025".to_string()), ..valid_row() });

        assert_eq!(missing.errors, vec!["Satır 2: Ziyaret tarihi zorunludur".to_string()]);
        assert_eq!(malformed.errors.len(), 1);
        assert!(malformed.errors[0].starts_with("Satır 2: Geçersiz tarih formatı: 31.02.2025"));
        assert!(malformed.scheduled_date.is_none());
    }

    #[test]
    fn test_missing_and_malformed_time_are_distinct() {
        let missing = validate_row(ImportRow { time: None, ..valid_row() });
        let malformed = validate_row(ImportRow { time: Some("öğlen".to_string()), ..valid_row() });

        assert_eq!(missing.errors, vec!["Satır 2: Ziyaret saati zorunludur".to_string()]);
        assert!(malformed.errors[0].starts_with("Satır 2: Geçersiz saat formatı: öğlen"));
    }

    #[test]
    fn test_all_errors_accumulated_and_joined() {
        let validated = validate_row(ImportRow { line: 2, ..Default::default() });
        assert_eq!(validated.errors.len(), 4);

        let message = validated.error_message();
        assert!(message.contains("Müşteri kodu veya müşteri adı zorunludur"));
        assert!(message.contains("Şube kodu veya şube adı zorunludur"));
        assert!(message.contains("Ziyaret tarihi zorunludur"));
        assert!(message.contains("Ziyaret saati zorunludur"));
        assert_eq!(message.matches("; ").count(), 3);
    }
}
