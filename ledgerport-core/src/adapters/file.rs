//! Local file adapters
//!
//! Templates live in `settings.json` under `importTemplates` /
//! `exportTemplates`; every other key in the file is preserved on write.
//! Committed records are appended to an NDJSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::table;
use crate::config::SETTINGS_FILE;
use crate::domain::result::{Error, Result};
use crate::domain::{CommitBatch, RecordOutcome, Template, TemplateBody, TemplateDraft, TemplateKind};
use crate::ports::{RecordSink, TemplateStore};

fn settings_key(kind: TemplateKind) -> &'static str {
    match kind {
        TemplateKind::Import => "importTemplates",
        TemplateKind::Export => "exportTemplates",
    }
}

/// Template store persisted in `<dir>/settings.json`
#[derive(Debug)]
pub struct JsonFileTemplateStore<B> {
    path: PathBuf,
    // serializes read-modify-write cycles on the file within this process
    lock: Arc<Mutex<()>>,
    _body: std::marker::PhantomData<fn() -> B>,
}

impl<B: TemplateBody> JsonFileTemplateStore<B> {
    pub fn new(dir: &Path) -> Self {
        Self::with_lock(dir, Arc::new(Mutex::new(())))
    }

    /// Share `lock` with the store of the other template kind, which
    /// writes the same file
    pub fn with_lock(dir: &Path, lock: Arc<Mutex<()>>) -> Self {
        Self {
            path: dir.join(SETTINGS_FILE),
            lock,
            _body: std::marker::PhantomData,
        }
    }

    async fn read_settings(&self) -> Result<Map<String, serde_json::Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Map::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("{} is not valid JSON: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self) -> Result<Vec<Template<B>>> {
        let settings = self.read_settings().await?;
        match settings.get(settings_key(B::KIND)) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, templates: &[Template<B>]) -> Result<()> {
        let mut settings = self.read_settings().await?;
        settings.insert(settings_key(B::KIND).to_string(), serde_json::to_value(templates)?);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&settings)?;
        tokio::fs::write(&self.path, content).await?;
        debug!(path = %self.path.display(), count = templates.len(), "saved templates");
        Ok(())
    }

    /// Load, modify and write back under the lock
    async fn modify<T>(&self, f: impl FnOnce(&mut Vec<Template<B>>) -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut templates = self.load().await?;
        let out = f(&mut templates)?;
        self.save(&templates).await?;
        Ok(out)
    }
}

#[async_trait]
impl<B: TemplateBody> TemplateStore<B> for JsonFileTemplateStore<B> {
    async fn list(&self) -> Result<Vec<Template<B>>> {
        self.load().await
    }

    async fn get(&self, id: &str) -> Result<Option<Template<B>>> {
        Ok(self.load().await?.into_iter().find(|t| t.id == id))
    }

    async fn create(&self, draft: TemplateDraft<B>) -> Result<Template<B>> {
        self.modify(|templates| Ok(table::create(templates, draft))).await
    }

    async fn update(&self, id: &str, draft: TemplateDraft<B>) -> Result<Template<B>> {
        self.modify(|templates| table::update(templates, id, draft)).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.modify(|templates| table::delete(templates, id)).await
    }

    async fn set_default(&self, id: &str) -> Result<Template<B>> {
        self.modify(|templates| table::set_default(templates, id)).await
    }
}

/// Appends each committed record as one JSON line
#[derive(Debug)]
pub struct NdjsonRecordSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl NdjsonRecordSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for NdjsonRecordSink {
    async fn commit_batch(&self, batch: &CommitBatch) -> Result<Vec<RecordOutcome>> {
        let mut lines = String::new();
        for record in &batch.records {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::Commit(format!("Failed to open {}: {}", self.path.display(), e)))?;
        file.write_all(lines.as_bytes())
            .await
            .map_err(|e| Error::Commit(format!("Failed to write {}: {}", self.path.display(), e)))?;
        file.flush().await?;

        Ok(vec![RecordOutcome::Committed; batch.records.len()])
    }
}
