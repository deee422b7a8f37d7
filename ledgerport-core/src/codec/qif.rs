//! QIF codec (import only)
//!
//! Transactions are separated by a `^` line. Inside a block each line starts
//! with a one-character tag; only D, T, P, M and L are read.

use crate::domain::record::{homogenize, parse_decimal};
use crate::domain::result::Result;
use crate::domain::{Record, Value};

fn amount_value(raw: &str) -> Value {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    parse_decimal(cleaned.trim()).map_or_else(|| Value::text(raw), Value::Number)
}

fn parse_block(lines: &[&str]) -> Option<Record> {
    let mut record = Record::new();
    for line in lines {
        let mut chars = line.chars();
        let Some(tag) = chars.next() else { continue };
        let rest = chars.as_str().trim();
        match tag {
            'D' => record.insert("date", rest),
            'T' => record.insert("amount", amount_value(rest)),
            'P' => record.insert("payee", rest),
            'M' => record.insert("memo", rest),
            'L' => record.insert("category", rest),
            _ => {}
        }
    }
    (!record.is_empty()).then_some(record)
}

pub fn parse(text: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim() == "^" {
            records.extend(parse_block(&block));
            block.clear();
        } else if !line.starts_with('!') && !line.trim().is_empty() {
            block.push(line);
        }
    }
    records.extend(parse_block(&block));
    Ok(homogenize(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_single_block() {
        let records = parse("D01/15/2024\nT-49.99\nPAcme Corp\n^").unwrap();
        assert_eq!(records.len(), 1);
        let expected = Record::new()
            .with("date", "01/15/2024")
            .with("amount", Decimal::new(-4999, 2))
            .with("payee", "Acme Corp");
        assert_eq!(records[0], expected);
    }

    #[test]
    fn test_header_crlf_and_unknown_tags() {
        let text = "!Type:Bank\r\nD02/01/2024\r\nT1,250.00\r\nN1001\r\nMRent\r\nLHousing\r\n^\r\n";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("amount"), Some(&Value::Number(Decimal::new(125000, 2))));
        assert_eq!(records[0].get("memo"), Some(&Value::text("Rent")));
        assert_eq!(records[0].get("category"), Some(&Value::text("Housing")));
        assert!(!records[0].contains_key("N"));
    }

    #[test]
    fn test_blocks_without_known_tags_are_dropped() {
        let records = parse("N42\nCX\n^\nD01/01/2024\nPShop\n^\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("payee"), Some(&Value::text("Shop")));
    }

    #[test]
    fn test_records_share_field_names() {
        let records = parse("D01/01/2024\nT5\n^\nD01/02/2024\nPShop\n^").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].has_same_keys(&records[1]));
        assert_eq!(records[1].get("amount"), Some(&Value::Null));
    }

    #[test]
    fn test_unparseable_amount_kept_as_text() {
        let records = parse("Tabc\n^").unwrap();
        assert_eq!(records[0].get("amount"), Some(&Value::text("abc")));
    }
}
