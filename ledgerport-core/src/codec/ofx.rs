//! OFX codec (import only)
//!
//! Transactions are pulled out of `<STMTTRN>` blocks by tag matching. Values
//! run to the next `<` or end of line, so SGML files without closing tags
//! read the same as XML ones.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::domain::record::{homogenize, parse_decimal};
use crate::domain::result::Result;
use crate::domain::{Record, Value};

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<STMTTRN>(.*?)</STMTTRN>").expect("valid block regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([A-Za-z0-9.]+)>\s*([^<\r\n]*)").expect("valid tag regex"))
}

/// Opening tags of one block, upper-cased, with their trimmed values.
/// The first occurrence of a tag wins.
fn tag_values(block: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for caps in tag_re().captures_iter(block) {
        values
            .entry(caps[1].to_ascii_uppercase())
            .or_insert_with(|| caps[2].trim().to_string());
    }
    values
}

/// `YYYYMMDD[HHMMSS...]` → date
fn posted_date(raw: &str) -> Value {
    raw.get(..8)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
        .map_or_else(|| Value::text(raw), Value::Date)
}

fn parse_transaction(block: &str) -> Record {
    let tags = tag_values(block);
    let tag_value = |tag: &str| tags.get(tag).filter(|v| !v.is_empty()).cloned();
    let mut record = Record::new();
    if let Some(posted) = tag_value("DTPOSTED") {
        record.insert("date", posted_date(&posted));
    }
    if let Some(raw) = tag_value("TRNAMT") {
        match parse_decimal(&raw) {
            Some(amount) => {
                record.insert("amount", amount);
                if amount.is_sign_negative() && !amount.is_zero() {
                    record.insert("grand_total", amount.abs());
                } else {
                    record.insert("payment_amount", amount);
                }
            }
            None => record.insert("amount", raw),
        }
    }
    if let Some(name) = tag_value("NAME") {
        record.insert("merchant_name", name);
    }
    if let Some(memo) = tag_value("MEMO") {
        record.insert("notes", memo);
    }
    if let Some(refnum) = tag_value("REFNUM") {
        record.insert("order_number", refnum);
    }
    record
}

pub fn parse(text: &str) -> Result<Vec<Record>> {
    let records = block_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| parse_transaction(m.as_str()))
        .filter(|r| !r.is_empty())
        .collect();
    Ok(homogenize(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const SAMPLE: &str = "<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS><BANKTRANLIST>
<STMTTRN>
<TRNTYPE>DEBIT</TRNTYPE>
<DTPOSTED>20240115120000</DTPOSTED>
<TRNAMT>-49.99</TRNAMT>
<NAME>Acme Corp</NAME>
<MEMO>Office chair</MEMO>
<REFNUM>A-100</REFNUM>
</STMTTRN>
</BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>";

    #[test]
    fn test_expense_has_absolute_grand_total() {
        let records = parse(SAMPLE).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.get("grand_total"), Some(&Value::Number(Decimal::new(4999, 2))));
        assert!(!r.contains_key("payment_amount"));
        assert_eq!(r.get("amount"), Some(&Value::Number(Decimal::new(-4999, 2))));
        assert_eq!(r.get("date"), Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())));
        assert_eq!(r.get("merchant_name"), Some(&Value::text("Acme Corp")));
        assert_eq!(r.get("notes"), Some(&Value::text("Office chair")));
        assert_eq!(r.get("order_number"), Some(&Value::text("A-100")));
    }

    #[test]
    fn test_sgml_without_closing_tags() {
        let text = "OFXHEADER:100\n<OFX>\n<STMTTRN>\n<TRNAMT>250.00\n<DTPOSTED>20240201\n<NAME>Payroll\n</STMTTRN>\n</OFX>";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("payment_amount"), Some(&Value::Number(Decimal::new(25000, 2))));
        assert!(!records[0].contains_key("grand_total"));
        assert_eq!(records[0].get("merchant_name"), Some(&Value::text("Payroll")));
    }

    #[test]
    fn test_mixed_transactions_share_keys() {
        let text = "<STMTTRN><TRNAMT>-5</TRNAMT></STMTTRN><STMTTRN><TRNAMT>7</TRNAMT></STMTTRN>";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].has_same_keys(&records[1]));
        assert_eq!(records[0].get("payment_amount"), Some(&Value::Null));
        assert_eq!(records[1].get("grand_total"), Some(&Value::Null));
    }

    #[test]
    fn test_tags_are_case_insensitive_and_first_wins() {
        let tags = tag_values("<name>First\n<NAME>Second\n<memo>\n<TrnAmt> 12.5 ");
        assert_eq!(tags.get("NAME").map(String::as_str), Some("First"));
        assert_eq!(tags.get("MEMO").map(String::as_str), Some(""));
        assert_eq!(tags.get("TRNAMT").map(String::as_str), Some("12.5"));

        let records = parse("<STMTTRN><name>Corner Cafe<trnamt>-3.20<memo></STMTTRN>").unwrap();
        assert_eq!(records[0].get("merchant_name"), Some(&Value::text("Corner Cafe")));
        assert!(!records[0].contains_key("notes"));
    }

    #[test]
    fn test_no_transactions() {
        assert!(parse("<OFX></OFX>").unwrap().is_empty());
    }
}
