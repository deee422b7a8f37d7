//! Core domain types
//!
//! Pure data structures shared by every layer: records, formats, the target
//! schema, mappings, templates and run summaries. No I/O lives here.

pub mod format;
pub mod mapping;
pub mod outcome;
pub mod record;
pub mod result;
pub mod schema;
pub mod template;

pub use format::FileFormat;
pub use mapping::{FieldMapping, MappingIssue};
pub use outcome::{CommitBatch, ExportArtifact, ExportResult, ImportResult, RecordOutcome};
pub use record::{Record, Value};
pub use schema::{FieldKind, TargetField, TargetSchema};
pub use template::{
    DateFormat, DateRange, Encoding, ExportFilters, ExportOptions, ExportSpec, ExportTemplate,
    ImportSettings, ImportSpec, ImportTemplate, Template, TemplateBody, TemplateDraft,
    TemplateKind,
};
