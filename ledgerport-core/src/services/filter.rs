//! Export filtering and field formatting

use chrono::NaiveDate;

use crate::domain::result::{Error, Result};
use crate::domain::{DateFormat, ExportFilters, FieldKind, Record, TargetSchema, Value};

/// Field the date range filter applies to
pub const DATE_FIELD: &str = "purchase_date";

/// Read a date out of a value: a date, ISO text (a time part is ignored) or
/// `MM/DD/YYYY` text
pub fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Text(s) => {
            let s = s.trim();
            DateFormat::Iso
                .parse(s)
                .or_else(|| s.get(..10).and_then(|head| DateFormat::Iso.parse(head)))
                .or_else(|| DateFormat::UsSlash.parse(s))
        }
        _ => None,
    }
}

/// The field's value unless it is absent, null or blank
fn present<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|v| match v {
        Value::Null => false,
        Value::Text(s) => !s.trim().is_empty(),
        _ => true,
    })
}

fn any_overlap(value: &Value, selected: &[String]) -> bool {
    value.as_list().iter().any(|item| selected.contains(item))
}

/// Whether a record passes every active filter.
///
/// Categories and tags match when any value intersects the selection.
/// Date, category and tag filters only judge records that carry the field;
/// a record without it passes. Status must always match.
pub fn matches(record: &Record, filters: &ExportFilters) -> bool {
    if let Some(range) = filters.date_range.filter(|r| !r.is_open()) {
        let date = present(record, DATE_FIELD).and_then(coerce_date);
        if date.map_or(false, |d| !range.contains(d)) {
            return false;
        }
    }
    if !filters.categories.is_empty()
        && present(record, "categories").map_or(false, |v| !any_overlap(v, &filters.categories))
    {
        return false;
    }
    if !filters.tags.is_empty() && present(record, "tags").map_or(false, |v| !any_overlap(v, &filters.tags)) {
        return false;
    }
    if !filters.status.is_empty() {
        let status = record.get("status").map(ToString::to_string).unwrap_or_default();
        if !filters.status.iter().any(|s| *s == status) {
            return false;
        }
    }
    if let Some(query) = filters.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let query = query.to_lowercase();
        let hit = record.iter().any(|(_, v)| match v {
            Value::Text(_) | Value::List(_) => v.to_string().to_lowercase().contains(&query),
            _ => false,
        });
        if !hit {
            return false;
        }
    }
    true
}

pub fn filter_records(records: &[Record], filters: &ExportFilters) -> Vec<Record> {
    records.iter().filter(|r| matches(r, filters)).cloned().collect()
}

/// Project records onto `fields` (all fields of the first record when empty)
/// and coerce dates to `YYYY-MM-DD` and currency to two decimals. A record
/// only gets the selected fields it actually has.
pub fn format_for_export(records: &[Record], fields: &[String], schema: &TargetSchema) -> Result<Vec<Record>> {
    let fields: Vec<String> = if fields.is_empty() {
        records
            .first()
            .map(|r| r.keys().map(String::from).collect())
            .unwrap_or_default()
    } else {
        fields.to_vec()
    };

    records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            fields
                .iter()
                .filter_map(|field| record.get(field).map(|value| (field, value.clone())))
                .map(|(field, value)| {
                    let value = coerce_for_export(field, value, schema)
                        .map_err(|msg| Error::serialize(format!("Row {}: {}", idx + 1, msg)))?;
                    Ok((field.clone(), value))
                })
                .collect::<Result<Record>>()
        })
        .collect()
}

fn coerce_for_export(field: &str, value: Value, schema: &TargetSchema) -> std::result::Result<Value, String> {
    if value.is_missing() {
        return Ok(value);
    }
    match schema.kind_of(field) {
        Some(FieldKind::Date) => coerce_date(&value)
            .map(Value::Date)
            .ok_or_else(|| format!("{} value \"{}\" is not a date", field, value)),
        Some(FieldKind::Currency) => value
            .as_decimal()
            .map(|d| {
                let mut rounded = d.round_dp(2);
                rounded.rescale(2);
                Value::Number(rounded)
            })
            .ok_or_else(|| format!("{} value \"{}\" is not a number", field, value)),
        _ => Ok(value),
    }
}

/// Human-readable list of the active filters
pub fn describe_filters(filters: &ExportFilters) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(range) = filters.date_range.filter(|r| !r.is_open()) {
        let start = range.start.map_or_else(|| "...".to_string(), |d| d.to_string());
        let end = range.end.map_or_else(|| "...".to_string(), |d| d.to_string());
        parts.push(format!("Date: {} to {}", start, end));
    }
    if !filters.categories.is_empty() {
        parts.push(format!("Categories: {}", filters.categories.join(", ")));
    }
    if !filters.tags.is_empty() {
        parts.push(format!("Tags: {}", filters.tags.join(", ")));
    }
    if !filters.status.is_empty() {
        parts.push(format!("Status: {}", filters.status.join(", ")));
    }
    if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(format!("Search: \"{}\"", search.trim()));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DateRange;
    use rust_decimal::Decimal;

    fn sample() -> Vec<Record> {
        vec![
            Record::new()
                .with("merchant_name", "Best Buy")
                .with("purchase_date", "2024-01-10")
                .with("grand_total", Decimal::new(19999, 2))
                .with("categories", Value::List(vec!["Electronics".into(), "Office".into()]))
                .with("status", "paid"),
            Record::new()
                .with("merchant_name", "Grocer")
                .with("purchase_date", "2024-02-01")
                .with("grand_total", 20)
                .with("categories", "Food")
                .with("status", "pending"),
            Record::new()
                .with("merchant_name", "Apple Store")
                .with("purchase_date", "2024-02-15T10:00:00Z")
                .with("grand_total", "999.5")
                .with("categories", "Electronics, Gadgets")
                .with("status", "paid"),
        ]
    }

    #[test]
    fn test_category_overlap() {
        let filters = ExportFilters {
            categories: vec!["Electronics".into()],
            ..Default::default()
        };
        let out = filter_records(&sample(), &filters);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_filters_combine_with_and() {
        let filters = ExportFilters {
            categories: vec!["Electronics".into()],
            date_range: Some(DateRange {
                start: NaiveDate::from_ymd_opt(2024, 2, 1),
                end: None,
            }),
            ..Default::default()
        };
        let out = filter_records(&sample(), &filters);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("merchant_name"), Some(&Value::text("Apple Store")));
    }

    #[test]
    fn test_records_without_the_field_pass() {
        let records = vec![
            Record::new().with("merchant_name", "No tags"),
            Record::new().with("merchant_name", "Null tags").with("tags", Value::Null),
            Record::new()
                .with("merchant_name", "Other tags")
                .with("tags", Value::List(vec!["home".into()])),
        ];
        let filters = ExportFilters {
            tags: vec!["work".into()],
            date_range: Some(DateRange {
                start: NaiveDate::from_ymd_opt(2024, 1, 1),
                end: None,
            }),
            ..Default::default()
        };
        let out = filter_records(&records, &filters);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].get("merchant_name"), Some(&Value::text("Null tags")));
    }

    #[test]
    fn test_status_filter_needs_a_status() {
        let records = vec![Record::new().with("merchant_name", "No status")];
        let filters = ExportFilters {
            status: vec!["paid".into()],
            ..Default::default()
        };
        assert!(filter_records(&records, &filters).is_empty());
    }

    #[test]
    fn test_status_and_search() {
        let filters = ExportFilters {
            status: vec!["paid".into()],
            search: Some("apple".into()),
            ..Default::default()
        };
        let out = filter_records(&sample(), &filters);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_format_coerces_dates_and_currency() {
        let schema = TargetSchema::default();
        let fields = vec!["purchase_date".to_string(), "grand_total".to_string()];
        let out = format_for_export(&sample(), &fields, &schema).unwrap();
        assert_eq!(out[2].keys().collect::<Vec<_>>(), vec!["purchase_date", "grand_total"]);
        assert_eq!(out[2].get("purchase_date").unwrap().to_string(), "2024-02-15");
        assert_eq!(out[2].get("grand_total").unwrap().to_string(), "999.50");
        assert_eq!(out[1].get("grand_total").unwrap().to_string(), "20.00");
    }

    #[test]
    fn test_format_defaults_to_first_record_fields() {
        let schema = TargetSchema::default();
        let out = format_for_export(&sample(), &[], &schema).unwrap();
        assert_eq!(out[0].len(), 5);
    }

    #[test]
    fn test_format_skips_fields_a_record_lacks() {
        let schema = TargetSchema::default();
        let records = vec![
            Record::new().with("merchant_name", "A").with("notes", "n"),
            Record::new().with("merchant_name", "B"),
        ];
        let fields = vec!["merchant_name".to_string(), "notes".to_string()];
        let out = format_for_export(&records, &fields, &schema).unwrap();
        assert_eq!(out[0].len(), 2);
        assert_eq!(out[1].keys().collect::<Vec<_>>(), vec!["merchant_name"]);
    }

    #[test]
    fn test_uncoercible_value_is_serialize_error() {
        let schema = TargetSchema::default();
        let records = vec![Record::new().with("grand_total", "n/a")];
        let err = format_for_export(&records, &[], &schema).unwrap_err();
        assert!(matches!(err, Error::Serialize(_)));
        assert!(err.to_string().contains("Row 1"));
    }

    #[test]
    fn test_describe_filters() {
        let filters = ExportFilters {
            tags: vec!["Tax Deductible".into()],
            search: Some(" uber ".into()),
            ..Default::default()
        };
        assert_eq!(
            describe_filters(&filters),
            vec!["Tags: Tax Deductible", "Search: \"uber\""]
        );
    }
}
