//! Export pipeline - `configure → exporting → complete`

use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{self, Attachment, SerializeOptions};
use crate::domain::result::{Error, Result};
use crate::domain::{
    ExportArtifact, ExportFilters, ExportOptions, ExportResult, ExportSpec, ExportTemplate,
    FileFormat, Record, TargetSchema, TemplateDraft,
};
use crate::services::filter::{describe_filters, filter_records, format_for_export};
use crate::services::progress::{ProgressHandle, ProgressReporter, RunningTask};
use crate::services::templates::TemplateService;

pub const EXPORT_TITLE: &str = "Expense Export";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Configure,
    Exporting,
    Complete,
}

impl ExportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Exporting => "exporting",
            Self::Complete => "complete",
        }
    }
}

/// Export configuration and outcome
#[derive(Clone)]
pub struct ExportSession {
    pub format: FileFormat,
    /// Fields to write, in order; empty means every field
    pub fields: Vec<String>,
    pub filters: ExportFilters,
    pub options: ExportOptions,
    /// Password for protected archives; never saved with templates
    pub password: Option<String>,
    /// Overrides `export_<date>.<ext>`
    pub filename: Option<String>,
    pub template_id: Option<String>,
    pub attachments: Vec<Attachment>,
    pub result: Option<ExportResult>,
    pub error: Option<String>,
}

impl Default for ExportSession {
    fn default() -> Self {
        Self {
            format: FileFormat::Excel,
            fields: Vec::new(),
            filters: ExportFilters::default(),
            options: ExportOptions::default(),
            password: None,
            filename: None,
            template_id: None,
            attachments: Vec::new(),
            result: None,
            error: None,
        }
    }
}

impl fmt::Debug for ExportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportSession")
            .field("format", &self.format)
            .field("fields", &self.fields)
            .field("filters", &self.filters)
            .field("options", &self.options)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("filename", &self.filename)
            .field("template_id", &self.template_id)
            .field("attachments", &self.attachments.len())
            .field("result", &self.result)
            .field("error", &self.error)
            .finish()
    }
}

/// Everything one export run needs, detached from the session
struct ExportJob {
    format: FileFormat,
    fields: Vec<String>,
    filters: ExportFilters,
    options: ExportOptions,
    password: Option<String>,
    filename: Option<String>,
    attachments: Vec<Attachment>,
    today: NaiveDate,
}

/// Drives one export session through its stages
pub struct ExportPipeline {
    schema: Arc<TargetSchema>,
    templates: Arc<TemplateService>,
    stage: ExportStage,
    session: ExportSession,
    task: Option<RunningTask<Result<ExportResult>>>,
}

impl ExportPipeline {
    pub fn new(schema: Arc<TargetSchema>, templates: Arc<TemplateService>) -> Self {
        Self {
            schema,
            templates,
            stage: ExportStage::Configure,
            session: ExportSession::default(),
            task: None,
        }
    }

    pub fn stage(&self) -> ExportStage {
        self.stage
    }

    pub fn session(&self) -> &ExportSession {
        &self.session
    }

    fn ensure_configuring(&self, action: &str) -> Result<()> {
        if self.stage != ExportStage::Configure {
            return Err(Error::invalid_state(format!(
                "Cannot {} during {} stage",
                action,
                self.stage.as_str()
            )));
        }
        Ok(())
    }

    fn transition(&mut self, to: ExportStage) {
        debug!(from = self.stage.as_str(), to = to.as_str(), "export stage");
        self.stage = to;
    }

    // === Configure ===

    pub fn set_format(&mut self, format: FileFormat) -> Result<()> {
        self.ensure_configuring("change the format")?;
        if !format.supports_export() {
            return Err(Error::validation(format!("Unsupported export format: {}", format)));
        }
        self.session.format = format;
        Ok(())
    }

    pub fn set_fields(&mut self, fields: Vec<String>) -> Result<()> {
        self.ensure_configuring("change the fields")?;
        self.session.fields = fields;
        Ok(())
    }

    pub fn set_filters(&mut self, filters: ExportFilters) -> Result<()> {
        self.ensure_configuring("change the filters")?;
        self.session.filters = filters;
        Ok(())
    }

    pub fn set_options(&mut self, options: ExportOptions) -> Result<()> {
        self.ensure_configuring("change the options")?;
        self.session.options = options;
        Ok(())
    }

    pub fn set_password(&mut self, password: Option<String>) -> Result<()> {
        self.ensure_configuring("change the password")?;
        self.session.password = password.filter(|p| !p.is_empty());
        Ok(())
    }

    pub fn set_filename(&mut self, filename: Option<String>) -> Result<()> {
        self.ensure_configuring("change the filename")?;
        self.session.filename = filename.filter(|f| !f.trim().is_empty());
        Ok(())
    }

    /// Bundled into zip exports when `include_attachments` is on
    pub fn add_attachment(&mut self, attachment: Attachment) -> Result<()> {
        self.ensure_configuring("add attachments")?;
        self.session.attachments.push(attachment);
        Ok(())
    }

    /// Overwrite format, fields, filters and options from a template
    pub async fn apply_template(&mut self, id: &str) -> Result<()> {
        self.ensure_configuring("apply a template")?;
        let template = self.templates.export.get(id).await?;
        self.session.format = template.format;
        self.session.fields = template.body.included_fields;
        self.session.filters = template.body.filters;
        self.session.options = template.body.options;
        info!(template = %template.id, "applied export template");
        self.session.template_id = Some(template.id);
        Ok(())
    }

    // === Exporting ===

    /// Filter, format and serialize `records` in the background
    pub fn start_export(&mut self, records: Vec<Record>) -> Result<()> {
        self.ensure_configuring("start an export")?;
        let job = ExportJob {
            format: self.session.format,
            fields: self.session.fields.clone(),
            filters: self.session.filters.clone(),
            options: self.session.options,
            password: self.session.password.clone(),
            filename: self.session.filename.clone(),
            attachments: self.session.attachments.clone(),
            today: Local::now().date_naive(),
        };
        let schema = Arc::clone(&self.schema);

        info!(format = %job.format, records = records.len(), "export started");
        self.session.result = None;
        self.session.error = None;
        self.task = Some(RunningTask::spawn(move |progress| async move {
            match tokio::task::spawn_blocking(move || build_export(&records, &job, &schema, &progress)).await {
                Ok(result) => result,
                Err(e) => Err(Error::Other(format!("Export failed: {}", e))),
            }
        }));
        self.transition(ExportStage::Exporting);
        Ok(())
    }

    /// Current progress, 0 to 100
    pub fn progress(&self) -> u8 {
        match (&self.task, self.stage) {
            (Some(task), _) => task.progress().current(),
            (None, ExportStage::Complete) => 100,
            _ => 0,
        }
    }

    pub fn progress_handle(&self) -> Option<ProgressHandle> {
        self.task.as_ref().map(RunningTask::progress)
    }

    /// Wait for the running export.
    ///
    /// Success moves to `complete`. A serialize failure stays in `exporting`
    /// with `error` set until the user cancels.
    pub async fn wait(&mut self) -> Result<&ExportResult> {
        if self.stage != ExportStage::Exporting {
            return Err(Error::invalid_state(format!(
                "Cannot wait for an export during {} stage",
                self.stage.as_str()
            )));
        }
        let task = self
            .task
            .take()
            .ok_or_else(|| Error::invalid_state("No export is running"))?;

        let result = match task.join().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(error = %e, "export failed");
                self.session.error = Some(e.to_string());
                return Err(e);
            }
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        info!(
            filename = %result.artifact.filename,
            records = result.record_count,
            bytes = result.file_size,
            "export complete"
        );
        self.transition(ExportStage::Complete);
        Ok(&*self.session.result.insert(result))
    }

    pub fn cancel(&mut self) {
        if self.task.is_some() {
            info!("export cancelled");
        }
        self.reset();
    }

    /// Back to `configure` with a fresh session
    pub fn reset(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.session = ExportSession::default();
        self.transition(ExportStage::Configure);
    }

    /// Store the current configuration as an export template
    pub async fn save_as_template(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<ExportTemplate> {
        let draft = TemplateDraft {
            name: name.trim().to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
            format: self.session.format,
            is_default: false,
            body: ExportSpec {
                included_fields: self.session.fields.clone(),
                filters: self.session.filters.clone(),
                options: self.session.options,
            },
        };
        self.templates.export.create(draft).await
    }
}

fn build_export(
    records: &[Record],
    job: &ExportJob,
    schema: &TargetSchema,
    progress: &ProgressReporter,
) -> Result<ExportResult> {
    let filtered = filter_records(records, &job.filters);
    debug!(kept = filtered.len(), total = records.len(), "filtered records");
    progress.report(10);

    let formatted = format_for_export(&filtered, &job.fields, schema)?;
    progress.report(40);

    let password = if job.options.password {
        match job.password.as_deref() {
            Some(pw) if !pw.is_empty() => Some(pw.to_string()),
            _ => return Err(Error::serialize("A password is required for protected exports")),
        }
    } else {
        None
    };

    let stem = format!("export_{}", job.today.format("%Y-%m-%d"));
    let options = SerializeOptions {
        title: EXPORT_TITLE.to_string(),
        stem: stem.clone(),
        attachments: if job.options.include_attachments {
            job.attachments.clone()
        } else {
            Vec::new()
        },
        password,
        compress: job.options.compress,
    };
    let bytes = codec::serialize(job.format, &formatted, &options)?;
    progress.report(90);

    let artifact = ExportArtifact {
        filename: job
            .filename
            .clone()
            .unwrap_or_else(|| format!("{}.{}", stem, job.format.extension())),
        mime_type: job.format.mime_type().to_string(),
        format: job.format,
        bytes,
    };
    let result = ExportResult {
        record_count: formatted.len(),
        file_size: artifact.size(),
        estimated_size: estimate_size(&formatted, job.format),
        date_summary: job.today.format("%Y-%m-%d").to_string(),
        filter_summary: describe_filters(&job.filters),
        artifact,
    };
    progress.finish();
    Ok(result)
}

fn size_multiplier(format: FileFormat) -> f64 {
    match format {
        FileFormat::Csv => 0.7,
        FileFormat::Excel => 1.2,
        FileFormat::Pdf => 1.5,
        FileFormat::Zip => 0.5,
        _ => 1.0,
    }
}

/// Rough output size from the compact JSON length of the records
pub fn estimate_size(records: &[Record], format: FileFormat) -> String {
    let bytes = codec::json::compact_len(records) as f64 * size_multiplier(format);
    format_estimate(bytes)
}

/// Size wording shared by estimates and finished exports
pub fn format_estimate(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    if bytes < KB {
        format!("{} B", bytes.ceil())
    } else if bytes < MB {
        format!("{} KB", (bytes / KB).ceil())
    } else {
        format!("{:.1} MB", bytes / MB)
    }
}
