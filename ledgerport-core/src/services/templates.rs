//! Template service - built-in presets plus stored templates

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::domain::result::{Error, Result};
use crate::domain::{
    DateFormat, DateRange, ExportFilters, ExportOptions, ExportSpec, FieldMapping, FileFormat,
    ImportSettings, ImportSpec, Record, Template, TemplateBody, TemplateDraft,
};
use crate::ports::TemplateStore;
use crate::services::mapping::normalize_field_name;

/// Read-only presets shipped with the engine
pub trait BuiltinTemplates: TemplateBody {
    fn builtins(today: NaiveDate) -> Vec<Template<Self>>;
}

fn builtin_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap_or_default()
}

fn builtin<B>(id: &str, name: &str, description: &str, format: FileFormat, body: B) -> Template<B> {
    Template {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        format,
        is_default: false,
        created_at: builtin_timestamp(),
        updated_at: builtin_timestamp(),
        body,
    }
}

fn mapping(pairs: &[(&str, &str)]) -> FieldMapping {
    pairs
        .iter()
        .fold(FieldMapping::new(), |m, (source, target)| m.with(*source, target))
}

impl BuiltinTemplates for ImportSpec {
    fn builtins(_today: NaiveDate) -> Vec<Template<Self>> {
        vec![
            builtin(
                "amazon-template",
                "Amazon Orders",
                "Import Amazon order history exports",
                FileFormat::Csv,
                ImportSpec {
                    field_mapping: mapping(&[
                        ("Order ID", "order_number"),
                        ("Order Date", "purchase_date"),
                        ("Total Charged", "grand_total"),
                        ("Shipping Address", "billing_address"),
                        ("Payment Method", "payment_method"),
                        ("Item Name", "product_name"),
                        ("Quantity", "quantity"),
                        ("Item Price", "unit_price"),
                    ]),
                    settings: ImportSettings {
                        date_format: DateFormat::UsSlash,
                        ..Default::default()
                    },
                    default_values: Record::new().with("merchant_name", "Amazon"),
                },
            ),
            builtin(
                "bank-template",
                "Bank Statement",
                "Import a checking or savings account statement",
                FileFormat::Csv,
                ImportSpec {
                    field_mapping: mapping(&[
                        ("Transaction Date", "purchase_date"),
                        ("Description", "merchant_name"),
                        ("Deposit", "payment_amount"),
                        ("Withdrawal", "grand_total"),
                        ("Balance", "account_balance"),
                    ]),
                    settings: ImportSettings {
                        date_format: DateFormat::UsSlash,
                        ..Default::default()
                    },
                    default_values: Record::new(),
                },
            ),
            builtin(
                "credit-card-template",
                "Credit Card Statement",
                "Import a credit card statement",
                FileFormat::Csv,
                ImportSpec {
                    field_mapping: mapping(&[
                        ("Transaction Date", "purchase_date"),
                        ("Posting Date", "posting_date"),
                        ("Description", "merchant_name"),
                        ("Category", "categories"),
                        ("Type", "transaction_type"),
                        ("Amount", "grand_total"),
                    ]),
                    settings: ImportSettings {
                        date_format: DateFormat::UsSlash,
                        ..Default::default()
                    },
                    default_values: Record::new(),
                },
            ),
            builtin(
                "quicken-qif-template",
                "Quicken (QIF)",
                "Map QIF transactions onto expenses",
                FileFormat::Qif,
                ImportSpec {
                    field_mapping: mapping(&[
                        ("date", "purchase_date"),
                        ("amount", "grand_total"),
                        ("payee", "merchant_name"),
                        ("memo", "notes"),
                        ("category", "categories"),
                    ]),
                    settings: ImportSettings {
                        date_format: DateFormat::UsSlash,
                        ..Default::default()
                    },
                    default_values: Record::new(),
                },
            ),
        ]
    }
}

fn previous_month(today: NaiveDate) -> DateRange {
    let first_this_month = today.with_day(1);
    let last_prev = first_this_month.and_then(|d| d.pred_opt());
    DateRange {
        start: last_prev.and_then(|d| d.with_day(1)),
        end: last_prev,
    }
}

fn previous_year(today: NaiveDate) -> DateRange {
    let year = today.year() - 1;
    DateRange {
        start: NaiveDate::from_ymd_opt(year, 1, 1),
        end: NaiveDate::from_ymd_opt(year, 12, 31),
    }
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl BuiltinTemplates for ExportSpec {
    fn builtins(today: NaiveDate) -> Vec<Template<Self>> {
        vec![
            builtin(
                "monthly-report",
                "Monthly Expense Report",
                "Last month's expenses as a spreadsheet",
                FileFormat::Excel,
                ExportSpec {
                    included_fields: fields(&[
                        "merchant_name",
                        "purchase_date",
                        "grand_total",
                        "categories",
                        "payment_method",
                        "status",
                    ]),
                    filters: ExportFilters {
                        date_range: Some(previous_month(today)),
                        ..Default::default()
                    },
                    options: ExportOptions::default(),
                },
            ),
            builtin(
                "tax-report",
                "Tax Deductible Expenses",
                "Last year's tax deductible expenses with receipts",
                FileFormat::Pdf,
                ExportSpec {
                    included_fields: fields(&[
                        "merchant_name",
                        "purchase_date",
                        "grand_total",
                        "estimated_tax",
                        "categories",
                        "notes",
                    ]),
                    filters: ExportFilters {
                        date_range: Some(previous_year(today)),
                        tags: vec!["Tax Deductible".to_string()],
                        ..Default::default()
                    },
                    options: ExportOptions {
                        include_attachments: true,
                        ..Default::default()
                    },
                },
            ),
            builtin(
                "category-summary",
                "Category Summary",
                "Totals by category",
                FileFormat::Csv,
                ExportSpec {
                    included_fields: fields(&["categories", "grand_total", "purchase_date"]),
                    filters: ExportFilters::default(),
                    options: ExportOptions::default(),
                },
            ),
        ]
    }
}

/// Presets plus stored templates for one template family
pub struct TemplateCatalog<B: BuiltinTemplates> {
    store: Arc<dyn TemplateStore<B>>,
}

impl<B: BuiltinTemplates> TemplateCatalog<B> {
    pub fn new(store: Arc<dyn TemplateStore<B>>) -> Self {
        Self { store }
    }

    fn builtins() -> Vec<Template<B>> {
        B::builtins(Local::now().date_naive())
    }

    pub fn is_builtin(id: &str) -> bool {
        Self::builtins().iter().any(|t| t.id == id)
    }

    fn ensure_writable(id: &str) -> Result<()> {
        if Self::is_builtin(id) {
            return Err(Error::validation(format!(
                "Built-in template \"{}\" is read-only",
                id
            )));
        }
        Ok(())
    }

    /// Built-in presets first, then stored templates
    pub async fn list(&self) -> Result<Vec<Template<B>>> {
        let mut all = Self::builtins();
        all.extend(self.store.list().await?);
        Ok(all)
    }

    pub async fn get(&self, id: &str) -> Result<Template<B>> {
        if let Some(t) = Self::builtins().into_iter().find(|t| t.id == id) {
            return Ok(t);
        }
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("{} template {}", B::KIND.as_str(), id)))
    }

    pub async fn create(&self, draft: TemplateDraft<B>) -> Result<Template<B>> {
        if draft.name.trim().is_empty() {
            return Err(Error::validation("Template name is required"));
        }
        let template = self.store.create(draft).await?;
        info!(kind = B::KIND.as_str(), id = %template.id, "created template");
        Ok(template)
    }

    pub async fn update(&self, id: &str, draft: TemplateDraft<B>) -> Result<Template<B>> {
        Self::ensure_writable(id)?;
        self.store.update(id, draft).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        Self::ensure_writable(id)?;
        self.store.delete(id).await?;
        info!(kind = B::KIND.as_str(), id, "deleted template");
        Ok(())
    }

    pub async fn set_default(&self, id: &str) -> Result<Template<B>> {
        Self::ensure_writable(id)?;
        self.store.set_default(id).await
    }

    /// The template flagged default for `format`, else the most recently
    /// updated one
    pub async fn default_for_format(&self, format: FileFormat) -> Result<Option<Template<B>>> {
        let candidates: Vec<Template<B>> = self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.format == format)
            .collect();
        if let Some(t) = candidates.iter().find(|t| t.is_default) {
            return Ok(Some(t.clone()));
        }
        Ok(candidates.into_iter().max_by_key(|t| t.updated_at))
    }

    /// Pretty JSON for sharing a template
    pub async fn export_to_json(&self, id: &str) -> Result<String> {
        let template = self.get(id).await?;
        Ok(serde_json::to_string_pretty(&template)?)
    }

    /// Store a template from shared JSON under a fresh id
    pub async fn import_from_json(&self, json: &str) -> Result<Template<B>> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|_| Error::validation("Invalid JSON format"))?;
        let obj = value
            .as_object()
            .ok_or_else(|| Error::validation("Invalid template format"))?;
        for key in ["name", "format", B::REQUIRED_KEY] {
            if obj.get(key).map_or(true, serde_json::Value::is_null) {
                return Err(Error::validation(format!(
                    "Invalid template format: missing \"{}\"",
                    key
                )));
            }
        }
        let mut draft: TemplateDraft<B> = serde_json::from_value(value)
            .map_err(|e| Error::validation(format!("Invalid template format: {}", e)))?;
        draft.is_default = false;
        self.create(draft).await
    }
}

/// A preset that looks like it fits a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSuggestion {
    pub template_id: String,
    pub name: String,
}

/// Suggest built-in import templates from a file's field names
pub fn suggest_templates(source_fields: &[String]) -> Vec<TemplateSuggestion> {
    let lowered: Vec<String> = source_fields.iter().map(|f| f.to_lowercase()).collect();
    let normalized: Vec<String> = source_fields.iter().map(|f| normalize_field_name(f)).collect();
    let has = |needle: &str| lowered.iter().any(|f| f.contains(needle));
    let has_exact = |name: &str| normalized.iter().any(|f| f == name);

    let mut ids: Vec<&str> = Vec::new();
    if has_exact("orderid") || (has("order") && has("date") && has("total")) {
        ids.push("amazon-template");
    }
    if has("transaction") && has("date") && (has("deposit") || has("withdrawal")) {
        ids.push("bank-template");
    }
    if has("transaction") && has("date") && has("amount") && (has("card") || has("credit") || has("posting")) {
        ids.push("credit-card-template");
    }
    if has_exact("payee") && has_exact("amount") {
        ids.push("quicken-qif-template");
    }

    let builtins = ImportSpec::builtins(Local::now().date_naive());
    ids.into_iter()
        .filter_map(|id| builtins.iter().find(|t| t.id == id))
        .map(|t| TemplateSuggestion {
            template_id: t.id.clone(),
            name: t.name.clone(),
        })
        .collect()
}

/// Import and export template catalogs
pub struct TemplateService {
    pub import: TemplateCatalog<ImportSpec>,
    pub export: TemplateCatalog<ExportSpec>,
}

impl TemplateService {
    pub fn new(
        import_store: Arc<dyn TemplateStore<ImportSpec>>,
        export_store: Arc<dyn TemplateStore<ExportSpec>>,
    ) -> Self {
        Self {
            import: TemplateCatalog::new(import_store),
            export: TemplateCatalog::new(export_store),
        }
    }
}
