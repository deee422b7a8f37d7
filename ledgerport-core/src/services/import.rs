//! Import pipeline - staged file import
//!
//! `upload → mapping → validation → importing → complete`. Only explicit
//! `back`, `cancel` and `reset` move backwards.

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{self, Detection, ParseOptions};
use crate::config::EngineConfig;
use crate::domain::result::{Error, Result};
use crate::domain::{
    CommitBatch, FieldMapping, ImportResult, ImportSettings, MappingIssue, Record, RecordOutcome,
    TargetSchema,
};
use crate::ports::RecordSink;
use crate::services::mapping::{self, Mapper};
use crate::services::progress::{ProgressHandle, ProgressReporter, RunningTask};
use crate::services::templates::{suggest_templates, TemplateService, TemplateSuggestion};
use crate::services::validation::{ValidationReport, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStage {
    Upload,
    Mapping,
    Validation,
    Importing,
    Complete,
}

impl ImportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Mapping => "mapping",
            Self::Validation => "validation",
            Self::Importing => "importing",
            Self::Complete => "complete",
        }
    }
}

/// Raw uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// State owned by one import run
#[derive(Debug, Clone, Default)]
pub struct ImportSession {
    /// Selected files; only the first is parsed
    pub files: Vec<SourceFile>,
    pub detection: Option<Detection>,
    /// Every parsed record of the first file
    pub records: Vec<Record>,
    pub preview: Vec<Record>,
    pub source_fields: Vec<String>,
    pub mapping: FieldMapping,
    /// Mapping of the applied template, consulted again after a re-read
    pub template_mapping: FieldMapping,
    pub settings: ImportSettings,
    pub default_values: Record,
    pub template_id: Option<String>,
    pub suggested_templates: Vec<TemplateSuggestion>,
    pub mapping_issues: Vec<MappingIssue>,
    pub validation: Option<ValidationReport>,
    pub mapped_preview: Vec<Record>,
    /// SHA-256 of the first file, hex encoded
    pub checksum: Option<String>,
    pub result: Option<ImportResult>,
    /// Last error shown to the user
    pub error: Option<String>,
}

/// Drives one import session through its stages
pub struct ImportPipeline {
    engine: EngineConfig,
    schema: Arc<TargetSchema>,
    templates: Arc<TemplateService>,
    sink: Arc<dyn RecordSink>,
    stage: ImportStage,
    session: ImportSession,
    task: Option<RunningTask<ImportResult>>,
}

impl ImportPipeline {
    pub fn new(
        engine: EngineConfig,
        schema: Arc<TargetSchema>,
        templates: Arc<TemplateService>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            engine,
            schema,
            templates,
            sink,
            stage: ImportStage::Upload,
            session: ImportSession::default(),
            task: None,
        }
    }

    pub fn stage(&self) -> ImportStage {
        self.stage
    }

    pub fn session(&self) -> &ImportSession {
        &self.session
    }

    fn ensure_stage(&self, expected: ImportStage, action: &str) -> Result<()> {
        if self.stage != expected {
            return Err(Error::invalid_state(format!(
                "Cannot {} during {} stage",
                action,
                self.stage.as_str()
            )));
        }
        Ok(())
    }

    fn transition(&mut self, to: ImportStage) {
        debug!(from = self.stage.as_str(), to = to.as_str(), "import stage");
        self.stage = to;
    }

    // === Upload ===

    /// Select files and parse the first one.
    ///
    /// On failure the session stays in `upload` with `error` set.
    pub fn select_files(&mut self, files: Vec<SourceFile>) -> Result<()> {
        self.ensure_stage(ImportStage::Upload, "select files")?;
        self.session = ImportSession {
            files,
            ..ImportSession::default()
        };

        if let Err(e) = self.load_first_file() {
            warn!(error = %e, "file selection failed");
            self.session.error = Some(e.to_string());
            return Err(e);
        }

        let sources = self.session.source_fields.clone();
        self.session.mapping = mapping::suggest_for_fields(&sources, &self.schema);
        self.session.suggested_templates = suggest_templates(&sources);
        info!(
            records = self.session.records.len(),
            mapped = self.session.mapping.mapped_count(),
            "file parsed"
        );
        self.transition(ImportStage::Mapping);
        Ok(())
    }

    /// Check, detect and parse the first file with the current settings
    fn load_first_file(&mut self) -> Result<()> {
        let file = self
            .session
            .files
            .first()
            .ok_or_else(|| Error::validation("Select a file to import"))?;

        if file.bytes.len() as u64 > self.engine.max_file_size_bytes {
            return Err(Error::validation(format!(
                "The file size exceeds the maximum allowed size ({}MB).",
                self.engine.max_file_size_bytes / (1024 * 1024)
            )));
        }

        let detection = codec::detect(&file.name, &file.bytes);
        if !detection.format.supports_import() {
            return Err(Error::parse(format!(
                "Unsupported import format: {}",
                detection.format
            )));
        }

        let options = ParseOptions {
            encoding: self.session.settings.encoding,
            skip_lines: self.session.settings.skip_lines,
        };
        let records = codec::parse(detection.format, &file.bytes, &options)?;
        if records.is_empty() {
            return Err(Error::parse("No records found in file"));
        }

        let checksum = hex::encode(Sha256::digest(&file.bytes));
        let preview: Vec<Record> = records.iter().take(self.engine.preview_rows).cloned().collect();

        self.session.source_fields = mapping::source_fields(&records);
        self.session.detection = Some(detection);
        self.session.checksum = Some(checksum);
        self.session.preview = preview;
        self.session.records = records;
        self.session.error = None;
        Ok(())
    }

    // === Mapping ===

    /// Load an import template's mapping, settings and default values.
    ///
    /// Template entries for fields the file lacks are ignored.
    pub async fn apply_template(&mut self, id: &str) -> Result<()> {
        self.ensure_stage(ImportStage::Mapping, "apply a template")?;
        let template = self.templates.import.get(id).await?;

        self.replace_settings(template.body.settings.clone())?;

        let mut mapping = FieldMapping::new();
        for source in &self.session.source_fields {
            mapping.set(source.clone(), template.body.field_mapping.target_of(source));
        }
        self.session.mapping = mapping;
        self.session.template_mapping = template.body.field_mapping.clone();
        self.session.default_values = template.body.default_values.clone();
        self.session.template_id = Some(template.id.clone());
        self.session.mapping_issues.clear();
        info!(template = %template.id, mapped = self.session.mapping.mapped_count(), "applied import template");
        Ok(())
    }

    pub fn update_mapping(&mut self, mapping: FieldMapping) -> Result<()> {
        self.ensure_stage(ImportStage::Mapping, "edit the mapping")?;
        self.session.mapping = mapping;
        self.session.mapping_issues.clear();
        Ok(())
    }

    /// Point one source field at a target, or clear it with `None`
    pub fn set_field_mapping(&mut self, source: &str, target: Option<&str>) -> Result<()> {
        self.ensure_stage(ImportStage::Mapping, "edit the mapping")?;
        self.session.mapping.set(source, target);
        self.session.mapping_issues.clear();
        Ok(())
    }

    pub fn update_settings(&mut self, settings: ImportSettings) -> Result<()> {
        self.ensure_stage(ImportStage::Mapping, "change import settings")?;
        self.replace_settings(settings)
    }

    pub fn set_default_values(&mut self, defaults: Record) -> Result<()> {
        self.ensure_stage(ImportStage::Mapping, "change default values")?;
        self.session.default_values = defaults;
        Ok(())
    }

    /// Encoding and skipped lines change what the file parses to, so
    /// changing either re-reads it. A failed re-read keeps the old state.
    ///
    /// After a re-read each source keeps its previous target when it had
    /// an entry, then takes the applied template's target, then the
    /// suggested one. A target already taken is left unmapped.
    fn replace_settings(&mut self, settings: ImportSettings) -> Result<()> {
        let reparse = settings.encoding != self.session.settings.encoding
            || settings.skip_lines != self.session.settings.skip_lines;
        let previous = std::mem::replace(&mut self.session.settings, settings);
        if !reparse {
            return Ok(());
        }

        let snapshot = self.session.clone();
        if let Err(e) = self.load_first_file() {
            self.session = snapshot;
            self.session.settings = previous;
            self.session.error = Some(e.to_string());
            return Err(e);
        }
        self.session.mapping = self.remap(&snapshot.mapping);
        self.session.suggested_templates = suggest_templates(&self.session.source_fields);
        self.session.mapping_issues.clear();
        debug!(mapped = self.session.mapping.mapped_count(), "mapping rebuilt after re-read");
        Ok(())
    }

    fn remap(&self, previous: &FieldMapping) -> FieldMapping {
        let sources = &self.session.source_fields;
        let suggested = mapping::suggest_for_fields(sources, &self.schema);
        let mut remapped = FieldMapping::new();
        for source in sources {
            let target = if previous.sources().any(|s| s == source.as_str()) {
                previous.target_of(source)
            } else {
                self.session
                    .template_mapping
                    .target_of(source)
                    .or_else(|| suggested.target_of(source))
            };
            let target = target.filter(|t| !remapped.is_target_mapped(t));
            remapped.set(source.clone(), target);
        }
        remapped
    }

    /// Targets that must be mapped: required ones not supplied as defaults
    fn required_targets(&self) -> Vec<String> {
        self.schema
            .required_ids()
            .into_iter()
            .filter(|id| {
                self.session
                    .default_values
                    .get(id)
                    .map_or(true, |v| v.is_missing())
            })
            .collect()
    }

    fn mapper(&self) -> Mapper<'_> {
        Mapper {
            mapping: &self.session.mapping,
            settings: &self.session.settings,
            defaults: &self.session.default_values,
            schema: &self.schema,
        }
    }

    /// Check the mapping, validate the mapped preview and move to
    /// `validation`. Mapping problems keep the session in `mapping`.
    pub fn continue_to_validation(&mut self) -> Result<&ValidationReport> {
        self.ensure_stage(ImportStage::Mapping, "continue to validation")?;

        let issues = mapping::validate_mapping(&self.session.mapping, &self.required_targets());
        if !issues.is_empty() {
            warn!(issues = issues.len(), "mapping rejected");
            self.session.mapping_issues = issues.clone();
            return Err(Error::Mapping(issues));
        }
        self.session.mapping_issues.clear();

        let mapped = self.mapper().apply_all(&self.session.preview);
        let report = Validator::new(&self.schema).validate(&mapped);
        debug!(rows = mapped.len(), issues = report.issues.len(), "validated preview");
        self.session.mapped_preview = mapped;
        self.transition(ImportStage::Validation);
        Ok(&*self.session.validation.insert(report))
    }

    /// `validation → mapping` keeping the mapping; `mapping → upload`
    /// clearing the session
    pub fn back(&mut self) -> Result<()> {
        match self.stage {
            ImportStage::Validation => {
                self.session.validation = None;
                self.session.mapped_preview.clear();
                self.transition(ImportStage::Mapping);
                Ok(())
            }
            ImportStage::Mapping => {
                self.session = ImportSession::default();
                self.transition(ImportStage::Upload);
                Ok(())
            }
            other => Err(Error::invalid_state(format!(
                "Cannot go back from {} stage",
                other.as_str()
            ))),
        }
    }

    // === Importing ===

    /// Map the full dataset and commit it in the background
    pub fn start_import(&mut self) -> Result<()> {
        self.ensure_stage(ImportStage::Validation, "start the import")?;
        if !self.session.validation.as_ref().map_or(false, |r| r.valid) {
            return Err(Error::validation("Resolve validation errors before importing"));
        }

        let records = self.mapper().apply_all(&self.session.records);
        let sink = Arc::clone(&self.sink);
        let checksum = self.session.checksum.clone().unwrap_or_default();
        let batch_size = self.engine.commit_batch_size.max(1);

        info!(records = records.len(), batch_size, "import started");
        self.task = Some(RunningTask::spawn(move |progress| async move {
            commit_records(sink.as_ref(), records, &checksum, batch_size, &progress).await
        }));
        self.transition(ImportStage::Importing);
        Ok(())
    }

    /// Current progress, 0 to 100
    pub fn progress(&self) -> u8 {
        match (&self.task, self.stage) {
            (Some(task), _) => task.progress().current(),
            (None, ImportStage::Complete) => 100,
            _ => 0,
        }
    }

    /// Subscribe to progress of the running import
    pub fn progress_handle(&self) -> Option<ProgressHandle> {
        self.task.as_ref().map(RunningTask::progress)
    }

    /// Wait for the running import and move to `complete`
    pub async fn wait(&mut self) -> Result<&ImportResult> {
        self.ensure_stage(ImportStage::Importing, "wait for the import")?;
        let task = self
            .task
            .take()
            .ok_or_else(|| Error::invalid_state("No import is running"))?;
        let result = match task.join().await {
            Ok(result) => result,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        info!(
            total = result.total_records,
            succeeded = result.successful_records,
            failed = result.failed_records,
            "import complete"
        );
        self.transition(ImportStage::Complete);
        Ok(&*self.session.result.insert(result))
    }

    /// Abandon the run. Batches already committed stay committed; the
    /// session is cleared and no result is kept.
    pub fn cancel(&mut self) {
        if self.task.is_some() {
            info!("import cancelled");
        }
        self.reset();
    }

    /// Back to `upload` with an empty session
    pub fn reset(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.session = ImportSession::default();
        self.transition(ImportStage::Upload);
    }
}

/// Commit `records` batch by batch, folding per-record outcomes into the
/// result. A failed batch fails its records and the run moves on.
async fn commit_records(
    sink: &dyn RecordSink,
    records: Vec<Record>,
    checksum: &str,
    batch_size: usize,
    progress: &ProgressReporter,
) -> ImportResult {
    let total = records.len();
    let mut result = ImportResult {
        total_records: total,
        ..ImportResult::default()
    };
    let mut done = 0;

    for (idx, chunk) in records.chunks(batch_size).enumerate() {
        let first_row = idx * batch_size + 1;
        let batch = CommitBatch {
            batch_id: Uuid::new_v4(),
            source_checksum: checksum.to_string(),
            first_row,
            records: chunk.to_vec(),
        };

        match sink.commit_batch(&batch).await {
            Ok(outcomes) => {
                for offset in 0..chunk.len() {
                    let row = first_row + offset;
                    match outcomes.get(offset) {
                        Some(RecordOutcome::Committed) => result.successful_records += 1,
                        Some(RecordOutcome::CommittedWithWarning(_)) => {
                            result.successful_records += 1;
                            result.warnings += 1;
                        }
                        Some(RecordOutcome::Rejected(reason)) => {
                            result.failed_records += 1;
                            result.errors.push(format!("Row {}: {}", row, reason));
                        }
                        None => {
                            result.failed_records += 1;
                            result.errors.push(format!("Row {}: no outcome reported", row));
                        }
                    }
                }
            }
            Err(e) => {
                warn!(batch = %batch.batch_id, first_row, error = %e, "batch commit failed");
                for offset in 0..chunk.len() {
                    result.failed_records += 1;
                    result.errors.push(format!("Row {}: {}", first_row + offset, e));
                }
            }
        }

        done += chunk.len();
        progress.report_fraction(done, total);
    }

    progress.finish();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryRecordSink, MemoryTemplateStore};
    use crate::services::progress::progress_channel;
    use async_trait::async_trait;

    fn pipeline_with(engine: EngineConfig, sink: Arc<dyn RecordSink>) -> ImportPipeline {
        let templates = TemplateService::new(
            Arc::new(MemoryTemplateStore::new()),
            Arc::new(MemoryTemplateStore::new()),
        );
        ImportPipeline::new(engine, Arc::new(TargetSchema::default()), Arc::new(templates), sink)
    }

    fn pipeline() -> ImportPipeline {
        pipeline_with(EngineConfig::default(), Arc::new(MemoryRecordSink::new()))
    }

    const CSV: &str = "Merchant Name,Purchase Date,Grand Total\nAcme,2024-01-15,10.50\nGlobex,2024-01-16,20\n";

    #[test]
    fn test_select_files_moves_to_mapping() {
        let mut p = pipeline();
        p.select_files(vec![SourceFile::new("expenses.csv", CSV)]).unwrap();
        assert_eq!(p.stage(), ImportStage::Mapping);
        let s = p.session();
        assert_eq!(s.records.len(), 2);
        assert_eq!(s.mapping.target_of("Merchant Name"), Some("merchant_name"));
        assert_eq!(s.mapping.target_of("Grand Total"), Some("grand_total"));
        assert_eq!(s.checksum.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_preview_is_bounded() {
        let engine = EngineConfig {
            preview_rows: 1,
            ..EngineConfig::default()
        };
        let mut p = pipeline_with(engine, Arc::new(MemoryRecordSink::new()));
        p.select_files(vec![SourceFile::new("expenses.csv", CSV)]).unwrap();
        assert_eq!(p.session().preview.len(), 1);
        assert_eq!(p.session().records.len(), 2);
    }

    #[test]
    fn test_oversized_file_stays_in_upload() {
        let engine = EngineConfig {
            max_file_size_bytes: 8,
            ..EngineConfig::default()
        };
        let mut p = pipeline_with(engine, Arc::new(MemoryRecordSink::new()));
        let err = p.select_files(vec![SourceFile::new("expenses.csv", CSV)]).unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum allowed size"));
        assert_eq!(p.stage(), ImportStage::Upload);
        assert!(p.session().error.is_some());
    }

    #[test]
    fn test_pdf_upload_is_rejected() {
        let mut p = pipeline();
        let err = p
            .select_files(vec![SourceFile::new("scan.pdf", b"%PDF-1.4".to_vec())])
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported import format: pdf"));
        assert_eq!(p.stage(), ImportStage::Upload);
    }

    #[test]
    fn test_no_mapped_fields_blocks_validation() {
        let mut p = pipeline();
        p.select_files(vec![SourceFile::new("expenses.csv", CSV)]).unwrap();
        p.update_mapping(FieldMapping::new()).unwrap();
        let err = p.continue_to_validation().unwrap_err();
        assert!(matches!(err, Error::Mapping(_)));
        assert_eq!(p.stage(), ImportStage::Mapping);
        assert!(p.session().mapping_issues.contains(&MappingIssue::NoFieldsMapped));
    }

    #[test]
    fn test_back_keeps_mapping() {
        let mut p = pipeline();
        p.select_files(vec![SourceFile::new("expenses.csv", CSV)]).unwrap();
        let mapping = p.session().mapping.clone();
        p.continue_to_validation().unwrap();
        p.back().unwrap();
        assert_eq!(p.stage(), ImportStage::Mapping);
        assert_eq!(p.session().mapping, mapping);
    }

    #[test]
    fn test_start_import_requires_valid_report() {
        let mut p = pipeline();
        let csv = "Merchant Name,Purchase Date,Grand Total\n,2024-01-15,abc\n";
        p.select_files(vec![SourceFile::new("expenses.csv", csv)]).unwrap();
        let report = p.continue_to_validation().unwrap();
        assert!(!report.valid);
        assert!(p.start_import().is_err());
        assert_eq!(p.stage(), ImportStage::Validation);
    }

    #[tokio::test]
    async fn test_skip_lines_after_template_keeps_template_mapping() {
        let mut p = pipeline();
        let csv = "Amazon order history\nOrder ID,Order Date,Total Charged\n12345,01/15/2024,49.99\n";
        p.select_files(vec![SourceFile::new("orders.csv", csv)]).unwrap();
        p.apply_template("amazon-template").await.unwrap();

        let settings = ImportSettings {
            skip_lines: 1,
            ..p.session().settings.clone()
        };
        p.update_settings(settings).unwrap();

        let s = p.session();
        assert_eq!(s.source_fields, vec!["Order ID", "Order Date", "Total Charged"]);
        assert_eq!(s.mapping.target_of("Order ID"), Some("order_number"));
        assert_eq!(s.mapping.target_of("Order Date"), Some("purchase_date"));
        assert_eq!(s.mapping.target_of("Total Charged"), Some("grand_total"));
        assert_eq!(s.template_id.as_deref(), Some("amazon-template"));

        let report = p.continue_to_validation().unwrap();
        assert!(report.valid, "{:?}", report.issues);
    }

    #[test]
    fn test_reread_keeps_edited_targets() {
        let mut p = pipeline();
        p.select_files(vec![SourceFile::new("expenses.csv", CSV)]).unwrap();
        p.set_field_mapping("Merchant Name", Some("notes")).unwrap();
        p.set_field_mapping("Grand Total", None).unwrap();

        let settings = ImportSettings {
            encoding: crate::domain::Encoding::Latin1,
            ..p.session().settings.clone()
        };
        p.update_settings(settings).unwrap();

        let mapping = &p.session().mapping;
        assert_eq!(mapping.target_of("Merchant Name"), Some("notes"));
        assert_eq!(mapping.target_of("Purchase Date"), Some("purchase_date"));
        assert_eq!(mapping.target_of("Grand Total"), None);
    }

    #[tokio::test]
    async fn test_commit_records_counts_outcomes() {
        let sink = MemoryRecordSink::with_rejections(|r| {
            (r.get("n").and_then(|v| v.as_decimal()) == Some(2.into())).then(|| "duplicate".to_string())
        });
        let records: Vec<Record> = (1..=5).map(|n| Record::new().with("n", n)).collect();
        let (reporter, handle) = progress_channel();

        let result = commit_records(&sink, records, "abc", 2, &reporter).await;
        assert_eq!(result.total_records, 5);
        assert_eq!(result.successful_records, 4);
        assert_eq!(result.failed_records, 1);
        assert_eq!(result.errors, vec!["Row 2: duplicate".to_string()]);
        assert_eq!(handle.current(), 100);

        let batches = sink.batches().await;
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].first_row, 5);
    }

    struct FailingSink;

    #[async_trait]
    impl RecordSink for FailingSink {
        async fn commit_batch(&self, batch: &CommitBatch) -> Result<Vec<RecordOutcome>> {
            if batch.first_row == 1 {
                Err(Error::Commit("connection reset".into()))
            } else {
                Ok(vec![RecordOutcome::CommittedWithWarning("rounded".into())])
            }
        }
    }

    #[tokio::test]
    async fn test_failed_batch_fails_its_rows_and_continues() {
        let records: Vec<Record> = (1..=3).map(|n| Record::new().with("n", n)).collect();
        let (reporter, _handle) = progress_channel();
        let result = commit_records(&FailingSink, records, "abc", 2, &reporter).await;
        assert_eq!(result.failed_records, 2);
        assert_eq!(result.successful_records, 1);
        assert_eq!(result.warnings, 1);
        assert!(result.errors[0].starts_with("Row 1: Commit error"));
        assert!(result.errors[1].starts_with("Row 2: "));
    }
}
