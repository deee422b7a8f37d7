//! JSON codec

use crate::domain::record::homogenize;
use crate::domain::result::{Error, Result};
use crate::domain::Record;

/// An array is taken as-is; a bare object becomes a one-element array
pub fn parse(text: &str) -> Result<Vec<Record>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Error::parse(format!("Invalid JSON: {}", e)))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        obj @ serde_json::Value::Object(_) => vec![obj],
        other => {
            return Err(Error::parse(format!(
                "Expected a JSON array or object, found {}",
                json_type(&other)
            )))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            serde_json::Value::Object(map) => records.push(Record::from(map)),
            other => {
                return Err(Error::parse(format!(
                    "Item {} is a JSON {}, expected an object",
                    idx + 1,
                    json_type(&other)
                )))
            }
        }
    }
    Ok(homogenize(records))
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

pub fn serialize(records: &[Record]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(records)?)
}

/// Byte length of the compact JSON rendering, the basis of size estimates
pub fn compact_len(records: &[Record]) -> usize {
    serde_json::to_string(records).map_or(0, |s| s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;
    use rust_decimal::Decimal;

    #[test]
    fn test_bare_object_is_lifted() {
        let records = parse(r#"{"merchant_name":"Acme","grand_total":12.5}"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("grand_total"), Some(&Value::Number(Decimal::new(125, 1))));
    }

    #[test]
    fn test_array_is_homogenized() {
        let records = parse(r#"[{"a":1},{"b":"x"}]"#).unwrap();
        assert_eq!(records[0].get("b"), Some(&Value::Null));
        assert_eq!(records[1].get("a"), Some(&Value::Null));
    }

    #[test]
    fn test_rejects_scalars() {
        assert!(matches!(parse("42"), Err(Error::Parse(_))));
        assert!(matches!(parse("[1,2]"), Err(Error::Parse(_))));
        assert!(matches!(parse("{oops"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_round_trip() {
        let records = vec![
            Record::new()
                .with("merchant_name", "Acme")
                .with("grand_total", Decimal::new(4999, 2))
                .with("tags", Value::List(vec!["work".into()])),
            Record::new()
                .with("merchant_name", "Shop")
                .with("grand_total", 10)
                .with("tags", Value::List(vec![])),
        ];
        let bytes = serialize(&records).unwrap();
        let back = parse(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_serialize_keeps_decimal_scale() {
        let records = vec![Record::new()
            .with("grand_total", Decimal::new(4200, 2))
            .with("purchase_date", chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())];
        let text = String::from_utf8(serialize(&records).unwrap()).unwrap();
        assert!(text.contains(r#""grand_total": 42.00"#), "{}", text);
        assert!(text.contains(r#""purchase_date": "2024-01-15""#), "{}", text);
        assert_eq!(parse(&text).unwrap(), records);
    }

    #[test]
    fn test_compact_len() {
        let records = vec![Record::new().with("a", 1)];
        assert_eq!(compact_len(&records), r#"[{"a":1}]"#.len());
    }
}
