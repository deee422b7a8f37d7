//! Field mapping engine
//!
//! Suggests a mapping from source field names onto the target schema, checks
//! a mapping before import, and applies it to parsed records.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::record::parse_decimal;
use crate::domain::{
    DateFormat, FieldKind, FieldMapping, ImportSettings, MappingIssue, Record, TargetSchema, Value,
};

/// Lowercase and keep only ASCII letters and digits
pub fn normalize_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Field names of the sample, taken from its first record
pub fn source_fields(sample: &[Record]) -> Vec<String> {
    sample
        .first()
        .map(|r| r.keys().map(String::from).collect())
        .unwrap_or_default()
}

/// Suggest a mapping for the sample's fields.
///
/// Exact normalized matches are taken first. Remaining sources then take the
/// first free target whose normalized name contains, or is contained in,
/// their own. A target is never assigned twice.
pub fn suggest_mapping(sample: &[Record], schema: &TargetSchema) -> FieldMapping {
    suggest_for_fields(&source_fields(sample), schema)
}

pub fn suggest_for_fields(sources: &[String], schema: &TargetSchema) -> FieldMapping {
    let targets: Vec<(&str, String)> = schema
        .ids()
        .map(|id| (id, normalize_field_name(id)))
        .collect();
    let normalized: Vec<String> = sources.iter().map(|s| normalize_field_name(s)).collect();

    let mut assigned: Vec<Option<&str>> = vec![None; sources.len()];
    let mut taken: Vec<&str> = Vec::new();

    for (idx, source) in normalized.iter().enumerate() {
        if source.is_empty() {
            continue;
        }
        if let Some((id, _)) = targets
            .iter()
            .find(|(id, target)| target == source && !taken.contains(id))
        {
            assigned[idx] = Some(*id);
            taken.push(*id);
        }
    }

    for (idx, source) in normalized.iter().enumerate() {
        if assigned[idx].is_some() || source.is_empty() {
            continue;
        }
        if let Some((id, _)) = targets.iter().find(|(id, target)| {
            !taken.contains(id)
                && !target.is_empty()
                && (source.contains(target.as_str()) || target.contains(source.as_str()))
        }) {
            assigned[idx] = Some(*id);
            taken.push(*id);
        }
    }

    let mut mapping = FieldMapping::new();
    for (source, target) in sources.iter().zip(assigned) {
        mapping.set(source.clone(), target);
    }
    debug!(
        sources = sources.len(),
        mapped = mapping.mapped_count(),
        "suggested field mapping"
    );
    mapping
}

/// Check a mapping: every required target mapped, no target mapped twice.
/// Each duplicated target is reported once.
pub fn validate_mapping(mapping: &FieldMapping, required: &[String]) -> Vec<MappingIssue> {
    let mut issues = Vec::new();

    if mapping.mapped_count() == 0 {
        issues.push(MappingIssue::NoFieldsMapped);
    }

    for target in required {
        if !mapping.is_target_mapped(target) {
            issues.push(MappingIssue::RequiredTargetUnmapped(target.clone()));
        }
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for (_, target) in mapping.mapped() {
        let count = counts.entry(target).or_insert(0);
        if *count == 0 {
            order.push(target);
        }
        *count += 1;
    }
    for target in order {
        if counts.get(target).copied().unwrap_or(0) > 1 {
            issues.push(MappingIssue::DuplicateTarget(target.to_string()));
        }
    }
    issues
}

/// Applies a mapping plus locale settings and default values to records
pub struct Mapper<'a> {
    pub mapping: &'a FieldMapping,
    pub settings: &'a ImportSettings,
    pub defaults: &'a Record,
    pub schema: &'a TargetSchema,
}

impl<'a> Mapper<'a> {
    /// Build the target record for one source record. Unmapped source fields
    /// are dropped; date and numeric text is normalized per the settings.
    pub fn apply(&self, record: &Record) -> Record {
        let mut out = Record::new();
        for (source, target) in self.mapping.mapped() {
            let value = record.get(source).cloned().unwrap_or_default();
            out.insert(target, self.convert(target, value));
        }
        for (target, value) in self.defaults.iter() {
            if out.get(target).map_or(true, Value::is_missing) {
                out.insert(target, value.clone());
            }
        }
        out
    }

    pub fn apply_all(&self, records: &[Record]) -> Vec<Record> {
        records.iter().map(|r| self.apply(r)).collect()
    }

    fn convert(&self, target: &str, value: Value) -> Value {
        match (self.schema.kind_of(target), value) {
            (Some(FieldKind::Date), Value::Text(text)) => {
                match self
                    .settings
                    .date_format
                    .parse(&text)
                    .or_else(|| DateFormat::Iso.parse(&text))
                {
                    Some(date) => Value::Date(date),
                    None => Value::Text(text),
                }
            }
            (Some(kind), Value::Text(text)) if kind.is_numeric() => {
                match normalize_number(&text, self.settings) {
                    Some(number) => Value::Number(number),
                    None => Value::Text(text),
                }
            }
            (_, value) => value,
        }
    }
}

fn normalize_number(text: &str, settings: &ImportSettings) -> Option<rust_decimal::Decimal> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != settings.thousands_separator && !c.is_whitespace())
        .map(|c| if c == settings.decimal_separator { '.' } else { c })
        .collect();
    parse_decimal(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("Merchant_Name"), "merchantname");
        assert_eq!(normalize_field_name("grand-total ($)"), "grandtotal");
        assert_eq!(normalize_field_name("Order #"), "order");
    }

    #[test]
    fn test_exact_then_partial() {
        let schema = TargetSchema::default();
        let mapping = suggest_for_fields(
            &fields(&["Merchant Name", "Grand Total", "Purchase Date Local", "Unrelated"]),
            &schema,
        );
        assert_eq!(mapping.target_of("Merchant Name"), Some("merchant_name"));
        assert_eq!(mapping.target_of("Grand Total"), Some("grand_total"));
        assert_eq!(mapping.target_of("Purchase Date Local"), Some("purchase_date"));
        assert_eq!(mapping.target_of("Unrelated"), None);
        assert_eq!(mapping.len(), 4);
    }

    #[test]
    fn test_partial_never_reuses_target() {
        let schema = TargetSchema::default();
        let mapping = suggest_for_fields(&fields(&["Notes 1", "Notes 2"]), &schema);
        assert_eq!(mapping.target_of("Notes 1"), Some("notes"));
        assert_eq!(mapping.target_of("Notes 2"), None);
    }

    #[test]
    fn test_exact_beats_earlier_partial() {
        let schema = TargetSchema::default();
        let mapping = suggest_for_fields(&fields(&["Status Code", "status"]), &schema);
        assert_eq!(mapping.target_of("status"), Some("status"));
        assert_eq!(mapping.target_of("Status Code"), None);
    }

    #[test]
    fn test_suggestion_is_deterministic() {
        let schema = TargetSchema::default();
        let sample = vec![Record::new().with("Total", 1).with("Date", "x").with("Store", "y")];
        assert_eq!(suggest_mapping(&sample, &schema), suggest_mapping(&sample, &schema));
    }

    #[test]
    fn test_validate_missing_required() {
        let mapping = FieldMapping::new().with("Vendor", "merchant_name");
        let issues = validate_mapping(&mapping, &TargetSchema::default().required_ids());
        assert!(issues.contains(&MappingIssue::RequiredTargetUnmapped("grand_total".into())));
        assert!(issues.contains(&MappingIssue::RequiredTargetUnmapped("purchase_date".into())));
        assert!(!issues.contains(&MappingIssue::RequiredTargetUnmapped("merchant_name".into())));
    }

    #[test]
    fn test_duplicate_reported_once() {
        let mapping = FieldMapping::new()
            .with("A", "order_number")
            .with("B", "order_number")
            .with("C", "order_number");
        let issues = validate_mapping(&mapping, &[]);
        assert_eq!(issues, vec![MappingIssue::DuplicateTarget("order_number".into())]);
    }

    #[test]
    fn test_empty_mapping_is_an_issue() {
        let issues = validate_mapping(&FieldMapping::new(), &[]);
        assert_eq!(issues, vec![MappingIssue::NoFieldsMapped]);
    }

    #[test]
    fn test_apply_converts_and_defaults() {
        let schema = TargetSchema::default();
        let mapping = FieldMapping::new()
            .with("Order Date", "purchase_date")
            .with("Total", "grand_total");
        let settings = ImportSettings {
            date_format: DateFormat::EuSlash,
            decimal_separator: ',',
            thousands_separator: '.',
            ..Default::default()
        };
        let defaults = Record::new().with("merchant_name", "Amazon");
        let mapper = Mapper {
            mapping: &mapping,
            settings: &settings,
            defaults: &defaults,
            schema: &schema,
        };
        let out = mapper.apply(
            &Record::new()
                .with("Order Date", "15/01/2024")
                .with("Total", "1.234,50")
                .with("Ignored", "x"),
        );
        assert_eq!(
            out.get("purchase_date"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()))
        );
        assert_eq!(out.get("grand_total"), Some(&Value::Number(Decimal::new(123450, 2))));
        assert_eq!(out.get("merchant_name"), Some(&Value::text("Amazon")));
        assert!(!out.contains_key("Ignored"));
    }

    #[test]
    fn test_apply_leaves_unparseable_values() {
        let schema = TargetSchema::default();
        let mapping = FieldMapping::new().with("d", "purchase_date");
        let settings = ImportSettings::default();
        let defaults = Record::new();
        let mapper = Mapper {
            mapping: &mapping,
            settings: &settings,
            defaults: &defaults,
            schema: &schema,
        };
        let out = mapper.apply(&Record::new().with("d", "yesterday"));
        assert_eq!(out.get("purchase_date"), Some(&Value::text("yesterday")));
    }
}
