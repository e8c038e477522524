//! Spreadsheet parsing for visit import
//!
//! Reads `.csv` with the `csv` crate and `.xlsx`/`.xlsm`/`.xls`/`.ods` with
//! `calamine`. The first row is the header; columns are matched by alias so
//! Turkish and English exports both work ("Müşteri Adı", "customer_name",
//! "customerName" all map to the same field).

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use thiserror::Error;
use tracing::debug;

use crate::types::ImportRow;

/// Spreadsheet could not be turned into rows
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpreadsheetError {
    #[error("desteklenmeyen dosya türü: {0}")]
    UnsupportedFormat(String),
    #[error("dosya okunamadı: {0}")]
    Unreadable(String),
    #[error("başlık satırında müşteri, şube veya tarih sütunu bulunamadı")]
    MissingColumns,
}

/// Import column a header maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    CustomerCode,
    CustomerName,
    BranchCode,
    BranchName,
    Operator,
    Date,
    Time,
    VisitType,
    Notes,
}

/// Header aliases, already folded by `fold_header`
const COLUMN_ALIASES: &[(Column, &[&str])] = &[
    (Column::CustomerCode, &["musterikodu", "customercode", "musterino"]),
    (Column::CustomerName, &["musteriadi", "musteri", "customername", "customer"]),
    (Column::BranchCode, &["subekodu", "branchcode", "subeno"]),
    (Column::BranchName, &["subeadi", "sube", "branchname", "branch"]),
    (Column::Operator, &["operator", "operatoradi", "teknisyen", "uygulayici"]),
    (Column::Date, &["tarih", "ziyarettarihi", "date", "visitdate", "scheduleddate"]),
    (Column::Time, &["saat", "ziyaretsaati", "time", "visittime", "scheduledtime"]),
    (Column::VisitType, &["ziyarettipi", "ziyaretturu", "hizmetturu", "visittype", "servicetype"]),
    (Column::Notes, &["notlar", "not", "aciklama", "notes", "note"]),
];

/// Lowercase, strip Turkish diacritics, drop everything that is not alphanumeric.
fn fold_header(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| {
            let c = match c {
                'ı' | 'I' | 'İ' | 'i' => 'i',
                'ş' | 'Ş' => 's',
                'ğ' | 'Ğ' => 'g',
                'ü' | 'Ü' => 'u',
                'ö' | 'Ö' => 'o',
                'ç' | 'Ç' => 'c',
                other => other.to_ascii_lowercase(),
            };
            c.is_ascii_alphanumeric().then_some(c)
        })
        .collect()
}

fn column_for(header: &str) -> Option<Column> {
    let folded = fold_header(header);
    COLUMN_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&folded.as_str()))
        .map(|(column, _)| *column)
}

/// Maps header positions to import columns
struct HeaderMap {
    columns: Vec<Option<Column>>,
}

impl HeaderMap {
    fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<Self, SpreadsheetError> {
        let columns: Vec<Option<Column>> = headers.into_iter().map(column_for).collect();
        let has = |wanted: &[Column]| columns.iter().flatten().any(|c| wanted.contains(c));

        if !has(&[Column::CustomerCode, Column::CustomerName])
            || !has(&[Column::BranchCode, Column::BranchName])
            || !has(&[Column::Date])
        {
            return Err(SpreadsheetError::MissingColumns);
        }
        Ok(Self { columns })
    }

    fn column(&self, index: usize) -> Option<Column> {
        self.columns.get(index).copied().flatten()
    }

    /// Build the row found on sheet line `line`; `None` when every cell is blank.
    fn build_row(&self, line: usize, cells: impl IntoIterator<Item = Option<String>>) -> Option<ImportRow> {
        let mut row = ImportRow { line, ..Default::default() };
        let mut any = false;
        for (index, value) in cells.into_iter().enumerate() {
            let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
                continue;
            };
            let Some(column) = self.column(index) else {
                continue;
            };
            any = true;
            let slot = match column {
                Column::CustomerCode => &mut row.customer_code,
                Column::CustomerName => &mut row.customer_name,
                Column::BranchCode => &mut row.branch_code,
                Column::BranchName => &mut row.branch_name,
                Column::Operator => &mut row.operator,
                Column::Date => &mut row.date,
                Column::Time => &mut row.time,
                Column::VisitType => &mut row.visit_type,
                Column::Notes => &mut row.notes,
            };
            *slot = Some(value);
        }
        any.then_some(row)
    }
}

/// Parse a spreadsheet file into import rows.
///
/// Blank lines are skipped; every row keeps the line number it had in the file
/// so messages point at the right place. A file with a header and no data
/// yields an empty vector; deciding that this is an error is up to the caller.
pub fn parse_spreadsheet(filename: &str, bytes: &[u8]) -> Result<Vec<ImportRow>, SpreadsheetError> {
    if bytes.is_empty() {
        return Err(SpreadsheetError::Unreadable("boş dosya".to_string()));
    }

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "csv" | "txt" => parse_csv(bytes)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => parse_workbook(bytes)?,
        _ => return Err(SpreadsheetError::UnsupportedFormat(filename.to_string())),
    };

    debug!("Parsed {} rows from '{}'", rows.len(), filename);
    Ok(rows)
}

// =============================================================================
// CSV
// =============================================================================

/// Pick `;` or `,` by whichever appears more often in the header line.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons >= commas { b';' } else { b',' }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<ImportRow>, SpreadsheetError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| SpreadsheetError::Unreadable("dosya UTF-8 değil".to_string()))?;
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SpreadsheetError::Unreadable(e.to_string()))?
        .clone();
    let map = HeaderMap::from_headers(headers.iter())?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SpreadsheetError::Unreadable(e.to_string()))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);
        if let Some(row) = map.build_row(line, record.iter().map(|cell| Some(cell.to_string()))) {
            rows.push(row);
        }
    }
    Ok(rows)
}

// =============================================================================
// WORKBOOKS
// =============================================================================

fn parse_workbook(bytes: &[u8]) -> Result<Vec<ImportRow>, SpreadsheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| SpreadsheetError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SpreadsheetError::Unreadable("çalışma sayfası yok".to_string()))?
        .map_err(|e| SpreadsheetError::Unreadable(e.to_string()))?;

    // Ranges begin at the first used cell, not at A1
    let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);

    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let header_texts: Vec<String> = header.iter().map(|c| cell_text(c, None).unwrap_or_default()).collect();
    let map = HeaderMap::from_headers(header_texts.iter().map(String::as_str))?;

    let rows = lines
        .enumerate()
        .filter_map(|(offset, cells)| {
            map.build_row(
                first_line + 1 + offset,
                cells
                    .iter()
                    .enumerate()
                    .map(|(index, cell)| cell_text(cell, map.column(index))),
            )
        })
        .collect();
    Ok(rows)
}

/// Render a workbook cell as text. Date/time cells use the format the
/// validator accepts for the column they sit in.
fn cell_text(cell: &Data, column: Option<Column>) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => {
            let value = dt.as_datetime()?;
            let text = match column {
                Some(Column::Time) => value.format("%H:%M").to_string(),
                Some(Column::Date) => value.format("%Y-%m-%d").to_string(),
                _ => value.format("%Y-%m-%d %H:%M").to_string(),
            };
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Format, Workbook};

    const CSV_HEADER: &str = "Müşteri Kodu;Müşteri Adı;Şube Kodu;Şube Adı;Operatör;Tarih;Saat;Ziyaret Tipi;Notlar";

    #[test]
    fn test_fold_header_strips_turkish_and_separators() {
        assert_eq!(fold_header("Müşteri Adı"), "musteriadi");
        assert_eq!(fold_header("ŞUBE KODU"), "subekodu");
        assert_eq!(fold_header("customer_name"), "customername");
        assert_eq!(fold_header("customerName"), "customername");
    }

    #[test]
    fn test_column_for_aliases() {
        assert_eq!(column_for("Müşteri Kodu"), Some(Column::CustomerCode));
        assert_eq!(column_for("Branch Name"), Some(Column::BranchName));
        assert_eq!(column_for("visitType"), Some(Column::VisitType));
        assert_eq!(column_for("Fiyat"), None);
    }

    #[test]
    fn test_parse_csv_semicolon() {
        let csv = format!(
            "{}\nC-001;Acme Gıda;S-01;Merkez;Ali Yılmaz;2025-03-14;10:30;İlaçlama;Arka kapı\n",
            CSV_HEADER
        );
        let rows = parse_spreadsheet("ziyaretler.csv", csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.line, 2);
        assert_eq!(row.customer_code.as_deref(), Some("C-001"));
        assert_eq!(row.customer_name.as_deref(), Some("Acme Gıda"));
        assert_eq!(row.branch_code.as_deref(), Some("S-01"));
        assert_eq!(row.branch_name.as_deref(), Some("Merkez"));
        assert_eq!(row.operator.as_deref(), Some("Ali Yılmaz"));
        assert_eq!(row.date.as_deref(), Some("2025-03-14"));
        assert_eq!(row.time.as_deref(), Some("10:30"));
        assert_eq!(row.visit_type.as_deref(), Some("İlaçlama"));
        assert_eq!(row.notes.as_deref(), Some("Arka kapı"));
    }

    #[test]
    fn test_parse_csv_comma_english_headers_and_blanks() {
        let csv = "customer_name,branch_name,date,time\nAcme,Depo, 14.03.2025 ,09:00\n,,,\nBeta,,2025-03-15,\n";
        let rows = parse_spreadsheet("visits.csv", csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2, "blank line should be skipped");
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[0].date.as_deref(), Some("14.03.2025"));
        assert!(rows[0].customer_code.is_none());
        assert!(rows[1].branch_name.is_none());
        assert!(rows[1].time.is_none());
    }

    #[test]
    fn test_parse_csv_with_bom() {
        let csv = "\u{feff}Müşteri Adı;Şube Adı;Tarih;Saat\nAcme;Merkez;2025-03-14;10:00\n";
        let rows = parse_spreadsheet("a.csv", csv.as_bytes()).unwrap();
        assert_eq!(rows[0].customer_name.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_header_only_yields_no_rows() {
        let rows = parse_spreadsheet("a.csv", CSV_HEADER.as_bytes()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_empty_file_is_unreadable() {
        let err = parse_spreadsheet("a.xlsx", &[]).unwrap_err();
        assert!(matches!(err, SpreadsheetError::Unreadable(_)));
    }

    #[test]
    fn test_unrecognized_headers_rejected() {
        let err = parse_spreadsheet("a.csv", b"foo;bar\n1;2\n").unwrap_err();
        assert_eq!(err, SpreadsheetError::MissingColumns);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_spreadsheet("a.pdf", b"%PDF-1.4").unwrap_err();
        assert!(matches!(err, SpreadsheetError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_corrupt_workbook_is_unreadable() {
        let err = parse_spreadsheet("a.xlsx", b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, SpreadsheetError::Unreadable(_)));
    }

    #[test]
    fn test_parse_xlsx_with_date_and_time_cells() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, title) in ["Müşteri Kodu", "Müşteri Adı", "Şube Adı", "Tarih", "Saat"].iter().enumerate() {
            sheet.write_string(0, col as u16, *title).unwrap();
        }
        sheet.write_number(1, 0, 1042.0).unwrap();
        sheet.write_string(1, 1, "Acme Gıda").unwrap();
        sheet.write_string(1, 2, "Merkez").unwrap();
        sheet
            .write_number_with_format(1, 3, 45730.0, &Format::new().set_num_format("dd.mm.yyyy"))
            .unwrap();
        sheet
            .write_number_with_format(1, 4, 0.4375, &Format::new().set_num_format("hh:mm"))
            .unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = parse_spreadsheet("ziyaretler.xlsx", &bytes).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_code.as_deref(), Some("1042"));
        assert_eq!(rows[0].customer_name.as_deref(), Some("Acme Gıda"));
        assert_eq!(rows[0].date.as_deref(), Some("2025-03-14"));
        assert_eq!(rows[0].time.as_deref(), Some("10:30"));
        assert_eq!(rows[0].line, 2);
    }

    #[test]
    fn test_csv_lines_survive_empty_lines() {
        let csv = format!("{}

C-001;;S-01;;;2025-03-14;10:00;;


C-002;;S-02;;;;;;
", CSV_HEADER);
        let rows = parse_spreadsheet("a.csv", csv.as_bytes()).unwrap();
        let lines: Vec<usize> = rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 6]);
    }

    #[test]
    fn test_xlsx_lines_follow_sheet_rows() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        // Table starts at B3 and has an empty row in the middle
        for (col, title) in ["Müşteri Adı", "Şube Adı", "Tarih"].iter().enumerate() {
            sheet.write_string(2, col as u16 + 1, *title).unwrap();
        }
        sheet.write_string(3, 1, "Acme").unwrap();
        sheet.write_string(3, 2, "Merkez").unwrap();
        sheet.write_string(5, 1, "Beta").unwrap();
        sheet.write_string(5, 2, "Sahil").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = parse_spreadsheet("a.xlsx", &bytes).unwrap();

        let lines: Vec<usize> = rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![4, 6]);
        assert_eq!(rows[1].customer_name.as_deref(), Some("Beta"));
    }
}
