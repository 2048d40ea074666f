//! CSV import and export.
//!
//! Chapter import reads files with the header
//! `order,title,content,is_vip,publish_at`. Cells are only coerced, never
//! validated: a non-numeric `order` becomes NaN and is stored as such.
//!
//! Export writes a header row and one line per row. String cells are always
//! quoted with embedded quotes doubled; numbers and booleans are written
//! bare and nulls as empty cells.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::Row;
use novel_admin_core::types::{new_id, word_count, Chapter};
use serde_json::Value;

/// Columns of the chapter import file.
pub const CHAPTER_COLUMNS: [&str; 5] = ["order", "title", "content", "is_vip", "publish_at"];

/// Splits CSV text into records of cells.
///
/// Supports quoted cells with `""` escapes, commas and line breaks inside
/// quotes, and both `\n` and `\r\n` line endings. A leading byte order
/// mark is skipped and blank lines are dropped.
pub fn parse_records(input: &str) -> Vec<Vec<String>> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cell.push('"');
                }
                '"' => in_quotes = false,
                _ => cell.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut cell)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut cell));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => cell.push(c),
        }
    }
    if !cell.is_empty() || !record.is_empty() {
        record.push(cell);
        push_record(&mut records, record);
    }
    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.len() == 1 && record[0].trim().is_empty();
    if !blank {
        records.push(record);
    }
}

/// One chapter read from an import file.
#[derive(Debug, Clone)]
pub struct ChapterImportRow {
    /// NaN when the cell is not a number.
    pub order: f64,
    pub title: String,
    pub content: String,
    pub is_vip: bool,
    pub publish_at: Option<DateTime<Utc>>,
    pub word_count: u64,
}

impl ChapterImportRow {
    /// Builds the chapter record for `book_id`.
    pub fn into_chapter(self, book_id: &str) -> Chapter {
        Chapter {
            id: new_id(),
            book_id: book_id.to_string(),
            order: self.order,
            title: self.title,
            content: self.content,
            is_vip: self.is_vip,
            word_count: self.word_count,
            publish_at: self.publish_at,
            created_at: Utc::now(),
        }
    }
}

/// Parses a chapter import file.
///
/// The first record is the header; columns are matched by name, so their
/// order in the file does not matter. Missing columns and short rows read
/// as empty cells. Fails only if the file has no header at all.
pub fn parse_chapter_csv(input: &str) -> AdminResult<Vec<ChapterImportRow>> {
    let mut records = parse_records(input).into_iter();
    let header = records
        .next()
        .ok_or_else(|| AdminError::validation("file", "missing header row"))?;
    let index: Vec<Option<usize>> = CHAPTER_COLUMNS
        .iter()
        .map(|name| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        })
        .collect();

    Ok(records
        .map(|record| {
            let cell = |column: usize| -> &str {
                index[column]
                    .and_then(|i| record.get(i))
                    .map(String::as_str)
                    .unwrap_or("")
            };
            let content = cell(2).to_string();
            ChapterImportRow {
                order: parse_order(cell(0)),
                title: cell(1).to_string(),
                word_count: word_count(&content),
                content,
                is_vip: cell(3).trim().eq_ignore_ascii_case("true"),
                publish_at: parse_timestamp(cell(4)),
            }
        })
        .collect())
}

fn parse_order(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Reads RFC 3339, `YYYY-MM-DD HH:MM[:SS]` or `YYYY-MM-DD` (UTC).
/// Empty or unreadable cells are `None`.
pub fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// Quotes a string cell.
fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => quote(text),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(other) => quote(&other.to_string()),
    }
}

/// Serializes the selected columns of `rows`.
pub fn rows_to_csv(columns: &[&str], rows: &[Row]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(","));
    for row in rows {
        lines.push(
            columns
                .iter()
                .map(|column| cell_text(row.get(*column)))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HEADER: &str = "order,title,content,is_vip,publish_at\n";

    #[test]
    fn test_basic_chapter_row() {
        let rows = parse_chapter_csv(&format!("{}1,第一章,内容,false,", HEADER)).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.order, 1.0);
        assert_eq!(row.title, "第一章");
        assert_eq!(row.content, "内容");
        assert!(!row.is_vip);
        assert!(row.publish_at.is_none());
        assert_eq!(row.word_count, 1);
    }

    #[test]
    fn test_non_numeric_order_is_nan() {
        let rows = parse_chapter_csv(&format!("{}x,Title,Body,true,", HEADER)).unwrap();
        assert!(rows[0].order.is_nan());
        assert!(rows[0].is_vip);
        assert_eq!(rows[0].title, "Title");
    }

    #[test]
    fn test_is_vip_case_insensitive() {
        let rows = parse_chapter_csv(&format!("{}1,a,b,TRUE,\n2,c,d,yes,\n", HEADER)).unwrap();
        assert!(rows[0].is_vip);
        assert!(!rows[1].is_vip);
    }

    #[test]
    fn test_quoted_cells_and_crlf() {
        let input = "order,title,content,is_vip,publish_at\r\n\
                     3,\"Hello, \"\"world\"\"\",\"line one\nline two\",false,2024-05-01 08:30\r\n";
        let rows = parse_chapter_csv(input).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Hello, \"world\"");
        assert_eq!(rows[0].content, "line one\nline two");
        assert_eq!(rows[0].word_count, 4);
        assert_eq!(
            rows[0].publish_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_header_order_and_short_rows() {
        let input = "\u{feff}title,order\nPrologue,0\n\nShort\n";
        let rows = parse_chapter_csv(input).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].order, 0.0);
        assert_eq!(rows[0].content, "");
        assert!(rows[1].order.is_nan());
    }

    #[test]
    fn test_empty_file_rejected() {
        assert!(parse_chapter_csv("").is_err());
        assert!(parse_chapter_csv(HEADER).unwrap().is_empty());
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-02"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("soon"), None);
    }

    #[test]
    fn test_export_quoting() {
        let row = json!({"id": "t1", "amount": -5, "note": "say \"hi\"", "flag": true, "missing": null});
        let rows = vec![row.as_object().cloned().unwrap()];
        let csv = rows_to_csv(&["id", "amount", "note", "flag", "missing"], &rows);
        assert_eq!(
            csv,
            "\"id\",\"amount\",\"note\",\"flag\",\"missing\"\n\"t1\",-5,\"say \"\"hi\"\"\",true,"
        );
    }
}
