//! Canonical target schema
//!
//! The fixed list of fields every import maps into. It is configuration, not
//! something derived from input files; see `engine.targetFields` in settings.

use serde::{Deserialize, Serialize};

/// Value shape a target field expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Currency,
    Date,
    List,
    Bool,
}

impl FieldKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Currency)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetField {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    pub kind: FieldKind,
}

impl TargetField {
    fn new(id: &str, label: &str, required: bool, kind: FieldKind) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            required,
            kind,
        }
    }
}

/// Ordered set of canonical target fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSchema {
    fields: Vec<TargetField>,
}

impl Default for TargetSchema {
    fn default() -> Self {
        use FieldKind::*;
        Self {
            fields: vec![
                TargetField::new("merchant_name", "Merchant Name", true, Text),
                TargetField::new("order_number", "Order Number", false, Text),
                TargetField::new("purchase_date", "Purchase Date", true, Date),
                TargetField::new("payment_method", "Payment Method", false, Text),
                TargetField::new("total_before_tax", "Total Before Tax", false, Currency),
                TargetField::new("estimated_tax", "Estimated Tax", false, Currency),
                TargetField::new("shipping_handling", "Shipping & Handling", false, Currency),
                TargetField::new("grand_total", "Grand Total", true, Currency),
                TargetField::new("product_name", "Product Name", false, Text),
                TargetField::new("quantity", "Quantity", false, Number),
                TargetField::new("unit_price", "Unit Price", false, Currency),
                TargetField::new("status", "Status", false, Text),
                TargetField::new("notes", "Notes", false, Text),
                TargetField::new("categories", "Categories", false, List),
                TargetField::new("tags", "Tags", false, List),
                TargetField::new("billing_address", "Billing Address", false, Text),
                TargetField::new("credit_card", "Credit Card", false, Text),
                TargetField::new("payment_amount", "Payment Amount", false, Currency),
                TargetField::new("account_balance", "Account Balance", false, Currency),
                TargetField::new("posting_date", "Posting Date", false, Date),
                TargetField::new("transaction_type", "Transaction Type", false, Text),
            ],
        }
    }
}

impl TargetSchema {
    pub fn new(fields: Vec<TargetField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[TargetField] {
        &self.fields
    }

    pub fn get(&self, id: &str) -> Option<&TargetField> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn kind_of(&self, id: &str) -> Option<FieldKind> {
        self.get(id).map(|f| f.kind)
    }

    /// Human label, falling back to the id for unknown fields
    pub fn label_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map_or(id, |f| f.label.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.id.as_str())
    }

    pub fn required_ids(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_required_fields() {
        let schema = TargetSchema::default();
        assert_eq!(
            schema.required_ids(),
            vec!["merchant_name", "purchase_date", "grand_total"]
        );
    }

    #[test]
    fn test_kinds() {
        let schema = TargetSchema::default();
        assert_eq!(schema.kind_of("grand_total"), Some(FieldKind::Currency));
        assert_eq!(schema.kind_of("quantity"), Some(FieldKind::Number));
        assert_eq!(schema.kind_of("purchase_date"), Some(FieldKind::Date));
        assert_eq!(schema.kind_of("nope"), None);
        assert_eq!(schema.label_of("nope"), "nope");
    }

    #[test]
    fn test_deserialize_override() {
        let json = r#"[{"id":"merchant_name","label":"Vendor","required":true,"kind":"text"}]"#;
        let schema: TargetSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.fields().len(), 1);
        assert_eq!(schema.label_of("merchant_name"), "Vendor");
    }
}
