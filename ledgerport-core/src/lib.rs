//! Ledgerport Core - import/export data interchange for expense records
//!
//! This crate follows a hexagonal architecture:
//!
//! - **domain**: Records, formats, target schema, mappings, templates
//! - **codec**: Format detection plus per-format parse/serialize
//! - **ports**: Trait definitions for external collaborators (TemplateStore, RecordSink)
//! - **services**: Mapping, validation, templates and the import/export pipelines
//! - **adapters**: Concrete implementations (in-memory, settings.json/NDJSON, HTTP)

pub mod adapters;
pub mod codec;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use adapters::file::{JsonFileTemplateStore, NdjsonRecordSink};
use adapters::http::{ApiClient, HttpRecordSink, HttpTemplateStore};
use adapters::memory::{MemoryRecordSink, MemoryTemplateStore};
use config::Config;
use domain::{ExportSpec, ImportSpec};
use ports::RecordSink;
use services::{ExportPipeline, ImportPipeline, TemplateService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{
    ExportResult, FieldMapping, FileFormat, ImportResult, Record, TargetSchema, Value,
};

/// Main context for Ledgerport operations
///
/// Holds configuration, the target schema, the template service and the
/// commit backend, and hands out pipelines wired to them.
pub struct LedgerportContext {
    pub config: Config,
    pub schema: Arc<TargetSchema>,
    pub templates: Arc<TemplateService>,
    pub sink: Arc<dyn RecordSink>,
}

impl LedgerportContext {
    /// Create a context for a data directory.
    ///
    /// With `backend.baseUrl` set, templates and commits go to the HTTP
    /// backend. Otherwise templates live in `settings.json` and committed
    /// records are appended to `ndjson_output` (default `<dir>/imported.ndjson`).
    pub fn new(dir: &Path, ndjson_output: Option<PathBuf>) -> Result<Self> {
        let config = Config::load(dir)?;

        let templates;
        let sink: Arc<dyn RecordSink>;
        match config.backend.base_url.as_deref() {
            Some(url) => {
                debug!(url, "using HTTP backend");
                let api = ApiClient::new(url, config.backend.timeout_secs)?;
                templates = TemplateService::new(
                    Arc::new(HttpTemplateStore::<ImportSpec>::new(api.clone())),
                    Arc::new(HttpTemplateStore::<ExportSpec>::new(api.clone())),
                );
                sink = Arc::new(HttpRecordSink::new(api));
            }
            None => {
                let output = ndjson_output.unwrap_or_else(|| dir.join("imported.ndjson"));
                debug!(dir = %dir.display(), output = %output.display(), "using local storage");
                let lock = Arc::new(tokio::sync::Mutex::new(()));
                templates = TemplateService::new(
                    Arc::new(JsonFileTemplateStore::<ImportSpec>::with_lock(dir, Arc::clone(&lock))),
                    Arc::new(JsonFileTemplateStore::<ExportSpec>::with_lock(dir, lock)),
                );
                sink = Arc::new(NdjsonRecordSink::new(output));
            }
        }

        Ok(Self::with_parts(config, templates, sink))
    }

    /// A context that keeps everything in memory
    pub fn in_memory() -> Self {
        Self::with_parts(
            Config::default(),
            TemplateService::new(
                Arc::new(MemoryTemplateStore::<ImportSpec>::new()),
                Arc::new(MemoryTemplateStore::<ExportSpec>::new()),
            ),
            Arc::new(MemoryRecordSink::new()),
        )
    }

    pub fn with_parts(config: Config, templates: TemplateService, sink: Arc<dyn RecordSink>) -> Self {
        let schema = Arc::new(config.schema());
        Self {
            config,
            schema,
            templates: Arc::new(templates),
            sink,
        }
    }

    pub fn import_pipeline(&self) -> ImportPipeline {
        ImportPipeline::new(
            self.config.engine.clone(),
            Arc::clone(&self.schema),
            Arc::clone(&self.templates),
            Arc::clone(&self.sink),
        )
    }

    pub fn export_pipeline(&self) -> ExportPipeline {
        ExportPipeline::new(Arc::clone(&self.schema), Arc::clone(&self.templates))
    }
}
