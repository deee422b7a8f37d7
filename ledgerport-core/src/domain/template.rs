//! Import and export templates

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::format::FileFormat;
use super::mapping::FieldMapping;
use super::record::Record;

/// Which family a template belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Import,
    Export,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Export => "export",
        }
    }
}

/// The kind-specific part of a template
pub trait TemplateBody:
    Serialize + DeserializeOwned + Clone + std::fmt::Debug + Send + Sync + 'static
{
    const KIND: TemplateKind;

    /// JSON key a template document must carry to be accepted on import
    const REQUIRED_KEY: &'static str;
}

/// A persisted, named preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template<B> {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub format: FileFormat,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: B,
}

/// Caller-supplied template content; ids and timestamps belong to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDraft<B> {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub format: FileFormat,
    #[serde(default)]
    pub is_default: bool,
    #[serde(flatten)]
    pub body: B,
}

impl<B: Clone> Template<B> {
    pub fn to_draft(&self) -> TemplateDraft<B> {
        TemplateDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            format: self.format,
            is_default: self.is_default,
            body: self.body.clone(),
        }
    }
}

impl<B> TemplateDraft<B> {
    /// Stamp a draft into a stored template
    pub fn into_template(self, id: String, now: DateTime<Utc>) -> Template<B> {
        Template {
            id,
            name: self.name,
            description: self.description,
            format: self.format,
            is_default: self.is_default,
            created_at: now,
            updated_at: now,
            body: self.body,
        }
    }
}

// === Import ===

/// Date layouts accepted in source files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "YYYY-MM-DD")]
    Iso,
    #[serde(rename = "MM/DD/YYYY")]
    UsSlash,
    #[serde(rename = "DD/MM/YYYY")]
    EuSlash,
    #[serde(rename = "MM-DD-YYYY")]
    UsDash,
    #[serde(rename = "DD-MM-YYYY")]
    EuDash,
    #[serde(rename = "MMM DD, YYYY")]
    MonthName,
}

impl DateFormat {
    pub const ALL: [DateFormat; 6] = [
        Self::Iso,
        Self::UsSlash,
        Self::EuSlash,
        Self::UsDash,
        Self::EuDash,
        Self::MonthName,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Iso => "YYYY-MM-DD",
            Self::UsSlash => "MM/DD/YYYY",
            Self::EuSlash => "DD/MM/YYYY",
            Self::UsDash => "MM-DD-YYYY",
            Self::EuDash => "DD-MM-YYYY",
            Self::MonthName => "MMM DD, YYYY",
        }
    }

    fn chrono_pattern(&self) -> &'static str {
        match self {
            Self::Iso => "%Y-%m-%d",
            Self::UsSlash => "%m/%d/%Y",
            Self::EuSlash => "%d/%m/%Y",
            Self::UsDash => "%m-%d-%Y",
            Self::EuDash => "%d-%m-%Y",
            Self::MonthName => "%b %d, %Y",
        }
    }

    pub fn parse(&self, s: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(s.trim(), self.chrono_pattern()).ok()
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.label() == label)
    }
}

/// Text encodings accepted for text-based formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "iso-8859-1")]
    Latin1,
    #[serde(rename = "windows-1252")]
    Windows1252,
    #[serde(rename = "ascii")]
    Ascii,
}

/// Locale settings applied while parsing and mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSettings {
    #[serde(default)]
    pub date_format: DateFormat,
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,
    #[serde(default = "default_thousands_separator")]
    pub thousands_separator: char,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default)]
    pub skip_lines: usize,
}

fn default_decimal_separator() -> char {
    '.'
}

fn default_thousands_separator() -> char {
    ','
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            date_format: DateFormat::default(),
            decimal_separator: default_decimal_separator(),
            thousands_separator: default_thousands_separator(),
            encoding: Encoding::default(),
            skip_lines: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSpec {
    pub field_mapping: FieldMapping,
    #[serde(default)]
    pub settings: ImportSettings,
    /// Constant values filled into targets the file leaves empty
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub default_values: Record,
}

impl TemplateBody for ImportSpec {
    const KIND: TemplateKind = TemplateKind::Import;
    const REQUIRED_KEY: &'static str = "fieldMapping";
}

// === Export ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ExportFilters {
    pub fn is_empty(&self) -> bool {
        self.date_range.map_or(true, |r| r.is_open())
            && self.categories.is_empty()
            && self.tags.is_empty()
            && self.status.is_empty()
            && self.search.as_deref().map_or(true, |s| s.trim().is_empty())
    }
}

/// Output options. `password` only records that a password is required;
/// the secret itself lives on the export session and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    #[serde(default)]
    pub include_attachments: bool,
    #[serde(default)]
    pub include_images: bool,
    #[serde(default)]
    pub password: bool,
    #[serde(default = "default_compress")]
    pub compress: bool,
}

fn default_compress() -> bool {
    true
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_attachments: false,
            include_images: false,
            password: false,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSpec {
    pub included_fields: Vec<String>,
    #[serde(default)]
    pub filters: ExportFilters,
    #[serde(default)]
    pub options: ExportOptions,
}

impl TemplateBody for ExportSpec {
    const KIND: TemplateKind = TemplateKind::Export;
    const REQUIRED_KEY: &'static str = "includedFields";
}

pub type ImportTemplate = Template<ImportSpec>;
pub type ExportTemplate = Template<ExportSpec>;
