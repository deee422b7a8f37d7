//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod export;
pub mod filter;
pub mod import;
pub mod mapping;
pub mod progress;
pub mod templates;
pub mod validation;

pub use export::{ExportPipeline, ExportSession, ExportStage};
pub use import::{ImportPipeline, ImportSession, ImportStage, SourceFile};
pub use mapping::{suggest_mapping, validate_mapping, Mapper};
pub use progress::{ProgressHandle, ProgressReporter, RunningTask};
pub use templates::{suggest_templates, TemplateCatalog, TemplateService, TemplateSuggestion};
pub use validation::{ValidationIssue, ValidationReport, Validator};
