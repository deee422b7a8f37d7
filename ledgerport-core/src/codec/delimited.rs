//! CSV codec

use std::sync::OnceLock;

use regex::Regex;

use super::header_of;
use super::text::skip_lines;
use crate::domain::record::{parse_decimal, parse_iso_date};
use crate::domain::result::{Error, Result};
use crate::domain::{Record, Value};

fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*-?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?\s*$").expect("valid numeric regex")
    })
}

/// Type a raw cell: empty → null, true/false → bool, `YYYY-MM-DD` → date,
/// numeric → number.
///
/// Integers with a leading zero (account numbers, zip codes) stay text.
pub fn infer_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match raw {
        "true" | "TRUE" | "True" => return Value::Bool(true),
        "false" | "FALSE" | "False" => return Value::Bool(false),
        _ => {}
    }
    if let Some(date) = parse_iso_date(raw.trim()) {
        return Value::Date(date);
    }
    if numeric_re().is_match(raw) && !has_leading_zero(raw.trim()) {
        if let Some(d) = parse_decimal(raw.trim()) {
            return Value::Number(d);
        }
    }
    Value::Text(raw.to_string())
}

fn has_leading_zero(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.")
}

pub fn parse(text: &str, skip: usize) -> Result<Vec<Record>> {
    let body = skip_lines(text, skip);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::parse(format!("Failed to read CSV header: {}", e)))?
        .iter()
        .map(String::from)
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::parse("CSV file has no header row"));
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(|e| Error::parse(format!("Row {}: {}", idx + 1, e)))?;
        let record = headers
            .iter()
            .enumerate()
            .map(|(col, name)| (name.clone(), row.get(col).map_or(Value::Null, infer_value)))
            .collect();
        records.push(record);
    }
    Ok(records)
}

pub fn serialize(records: &[Record]) -> Result<Vec<u8>> {
    let header = header_of(records);
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| Error::serialize(format!("CSV write failed: {}", e));

    writer.write_record(&header).map_err(csv_err)?;
    for record in records {
        let row: Vec<String> = header
            .iter()
            .map(|k| record.get(k).map(ToString::to_string).unwrap_or_default())
            .collect();
        writer.write_record(&row).map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::serialize(format!("CSV write failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_types_values() {
        let records = parse("Order ID,Order Date,Total Charged\n12345,01/15/2024,49.99\n", 0).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.get("Order ID"), Some(&Value::from(12345)));
        assert_eq!(r.get("Order Date"), Some(&Value::text("01/15/2024")));
        assert_eq!(r.get("Total Charged"), Some(&Value::Number(Decimal::new(4999, 2))));
    }

    #[test]
    fn test_infer_value() {
        assert_eq!(infer_value(""), Value::Null);
        assert_eq!(infer_value("TRUE"), Value::Bool(true));
        assert_eq!(infer_value("00123"), Value::text("00123"));
        assert_eq!(infer_value("0.5"), Value::Number(Decimal::new(5, 1)));
        assert_eq!(infer_value("-12"), Value::from(-12));
        assert_eq!(infer_value("1,234.50"), Value::text("1,234.50"));
        assert_eq!(
            infer_value("2024-01-15"),
            Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(infer_value("2024-01-15T10:00"), Value::text("2024-01-15T10:00"));
    }

    #[test]
    fn test_short_rows_pad_with_null_and_blank_lines_skip() {
        let records = parse("a,b,c\n1,2\n\n3,4,5\n", 0).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("c"), Some(&Value::Null));
        assert_eq!(records[1].get("c"), Some(&Value::from(5)));
    }

    #[test]
    fn test_skip_lines_before_header() {
        let records = parse("Bank export\nGenerated today\nDate,Amount\n2024-01-01,5\n", 2).unwrap();
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["Date", "Amount"]);
    }

    #[test]
    fn test_serialize_uses_first_record_header() {
        let records = vec![
            Record::new().with("a", 1).with("b", "x"),
            Record::new().with("a", 2).with("c", "dropped"),
        ];
        let out = String::from_utf8(serialize(&records).unwrap()).unwrap();
        assert_eq!(out, "a,b\n1,x\n2,\n");
    }

    #[test]
    fn test_round_trip() {
        let records = vec![
            Record::new()
                .with("merchant_name", "Acme, Inc.")
                .with("grand_total", Decimal::new(4999, 2))
                .with("paid", true),
            Record::new()
                .with("merchant_name", "Corner \"Shop\"")
                .with("grand_total", 12)
                .with("paid", false),
        ];
        let bytes = serialize(&records).unwrap();
        let back = parse(std::str::from_utf8(&bytes).unwrap(), 0).unwrap();
        assert_eq!(back, records);
    }
}
