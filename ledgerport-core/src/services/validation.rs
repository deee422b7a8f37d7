//! Validation engine for mapped records

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{FieldKind, Record, TargetSchema, Value};

/// One problem with one field of one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// 1-indexed row
    pub row: usize,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Human-readable messages, in row order
    pub fn errors(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"))
}

/// Checks mapped records against the target schema. Never mutates or drops
/// rows; the caller decides what to do with the report.
pub struct Validator<'a> {
    schema: &'a TargetSchema,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a TargetSchema) -> Self {
        Self { schema }
    }

    pub fn validate(&self, records: &[Record]) -> ValidationReport {
        let issues: Vec<ValidationIssue> = records
            .iter()
            .enumerate()
            .flat_map(|(idx, record)| self.validate_row(idx + 1, record))
            .collect();
        ValidationReport {
            valid: issues.is_empty(),
            issues,
        }
    }

    fn validate_row(&self, row: usize, record: &Record) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if record.get("merchant_name").map_or(true, Value::is_missing) {
            issues.push(ValidationIssue {
                row,
                field: "merchant_name".to_string(),
                message: "Missing merchant name".to_string(),
            });
        }

        for (field, value) in record.iter() {
            if value.is_missing() {
                continue;
            }
            let label = self.schema.label_of(field);
            match self.schema.kind_of(field) {
                Some(FieldKind::Date) if !is_iso_date(value) => issues.push(ValidationIssue {
                    row,
                    field: field.to_string(),
                    message: format!("Invalid date format for {}. Expected YYYY-MM-DD", label),
                }),
                Some(kind) if kind.is_numeric() && value.as_decimal().is_none() => {
                    issues.push(ValidationIssue {
                        row,
                        field: field.to_string(),
                        message: format!("{} must be a number", label),
                    })
                }
                _ => {}
            }
        }
        issues
    }
}

fn is_iso_date(value: &Value) -> bool {
    match value {
        Value::Date(_) => true,
        Value::Text(s) => iso_date_re().is_match(s),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn valid_record() -> Record {
        Record::new()
            .with("merchant_name", "Acme")
            .with("purchase_date", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
            .with("grand_total", Decimal::new(4999, 2))
    }

    #[test]
    fn test_valid_records() {
        let schema = TargetSchema::default();
        let report = Validator::new(&schema).validate(&[valid_record(), valid_record()]);
        assert!(report.valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_row_errors_are_one_indexed() {
        let schema = TargetSchema::default();
        let bad = Record::new()
            .with("merchant_name", "")
            .with("purchase_date", "01/15/2024")
            .with("grand_total", "lots")
            .with("quantity", "two");
        let report = Validator::new(&schema).validate(&[valid_record(), bad]);
        assert!(!report.valid);
        assert_eq!(
            report.errors(),
            vec![
                "Row 2: Missing merchant name",
                "Row 2: Invalid date format for Purchase Date. Expected YYYY-MM-DD",
                "Row 2: Grand Total must be a number",
                "Row 2: Quantity must be a number",
            ]
        );
    }

    #[test]
    fn test_iso_text_dates_and_numeric_text_pass() {
        let schema = TargetSchema::default();
        let record = Record::new()
            .with("merchant_name", "Acme")
            .with("purchase_date", "2024-01-15")
            .with("unit_price", "3.50");
        assert!(Validator::new(&schema).validate(&[record]).valid);
    }

    #[test]
    fn test_validation_is_idempotent_and_pure() {
        let schema = TargetSchema::default();
        let records = vec![Record::new().with("grand_total", "x")];
        let before = records.clone();
        let validator = Validator::new(&schema);
        assert_eq!(validator.validate(&records), validator.validate(&records));
        assert_eq!(records, before);
    }
}
