//! In-memory adapters
//!
//! Used by tests and by callers that keep templates and committed records in
//! their own process.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::table;
use crate::domain::result::Result;
use crate::domain::{CommitBatch, Record, RecordOutcome, Template, TemplateBody, TemplateDraft};
use crate::ports::{RecordSink, TemplateStore};

/// Template store backed by a vector behind an async lock
#[derive(Debug)]
pub struct MemoryTemplateStore<B> {
    templates: RwLock<Vec<Template<B>>>,
}

impl<B> Default for MemoryTemplateStore<B> {
    fn default() -> Self {
        Self {
            templates: RwLock::new(Vec::new()),
        }
    }
}

impl<B> MemoryTemplateStore<B> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<B: TemplateBody> TemplateStore<B> for MemoryTemplateStore<B> {
    async fn list(&self) -> Result<Vec<Template<B>>> {
        Ok(self.templates.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Template<B>>> {
        Ok(self.templates.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn create(&self, draft: TemplateDraft<B>) -> Result<Template<B>> {
        Ok(table::create(&mut *self.templates.write().await, draft))
    }

    async fn update(&self, id: &str, draft: TemplateDraft<B>) -> Result<Template<B>> {
        table::update(&mut self.templates.write().await, id, draft)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        table::delete(&mut *self.templates.write().await, id)
    }

    async fn set_default(&self, id: &str) -> Result<Template<B>> {
        table::set_default(&mut self.templates.write().await, id)
    }
}

type RejectFn = dyn Fn(&Record) -> Option<String> + Send + Sync;

/// Record sink that keeps committed records in memory.
///
/// An optional rule rejects records, standing in for backend-side checks.
#[derive(Default)]
pub struct MemoryRecordSink {
    committed: RwLock<Vec<Record>>,
    batches: RwLock<Vec<CommitBatch>>,
    reject: Option<Arc<RejectFn>>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every record for which `rule` returns a reason
    pub fn with_rejections<F>(rule: F) -> Self
    where
        F: Fn(&Record) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            reject: Some(Arc::new(rule)),
            ..Self::default()
        }
    }

    pub async fn committed(&self) -> Vec<Record> {
        self.committed.read().await.clone()
    }

    pub async fn batches(&self) -> Vec<CommitBatch> {
        self.batches.read().await.clone()
    }
}

#[async_trait]
impl RecordSink for MemoryRecordSink {
    async fn commit_batch(&self, batch: &CommitBatch) -> Result<Vec<RecordOutcome>> {
        let mut committed = self.committed.write().await;
        let outcomes = batch
            .records
            .iter()
            .map(|record| match self.reject.as_ref().and_then(|rule| rule(record)) {
                Some(reason) => RecordOutcome::Rejected(reason),
                None => {
                    committed.push(record.clone());
                    RecordOutcome::Committed
                }
            })
            .collect();
        self.batches.write().await.push(batch.clone());
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExportSpec, FileFormat};
    use uuid::Uuid;

    fn draft(name: &str, format: FileFormat, is_default: bool) -> TemplateDraft<ExportSpec> {
        TemplateDraft {
            name: name.to_string(),
            description: None,
            format,
            is_default,
            body: ExportSpec::default(),
        }
    }

    #[tokio::test]
    async fn test_store_assigns_ids_and_timestamps() {
        let store = MemoryTemplateStore::<ExportSpec>::new();
        let a = store.create(draft("A", FileFormat::Csv, false)).await.unwrap();
        let b = store.create(draft("B", FileFormat::Csv, false)).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);

        let updated = store.update(&a.id, draft("A2", FileFormat::Csv, false)).await.unwrap();
        assert_eq!(updated.created_at, a.created_at);
        assert!(updated.updated_at >= a.updated_at);
        assert_eq!(store.get(&a.id).await.unwrap().unwrap().name, "A2");
    }

    #[tokio::test]
    async fn test_set_default_is_exclusive_per_format() {
        let store = MemoryTemplateStore::<ExportSpec>::new();
        let a = store.create(draft("A", FileFormat::Csv, true)).await.unwrap();
        let b = store.create(draft("B", FileFormat::Csv, false)).await.unwrap();
        let pdf = store.create(draft("P", FileFormat::Pdf, true)).await.unwrap();

        store.set_default(&b.id).await.unwrap();
        assert!(!store.get(&a.id).await.unwrap().unwrap().is_default);
        assert!(store.get(&b.id).await.unwrap().unwrap().is_default);
        assert!(store.get(&pdf.id).await.unwrap().unwrap().is_default);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryTemplateStore::<ExportSpec>::new();
        assert!(store.delete("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_sink_rejections() {
        let sink = MemoryRecordSink::with_rejections(|r| {
            r.get("grand_total")
                .and_then(|v| v.as_decimal())
                .filter(|d| d.is_sign_negative())
                .map(|_| "negative total".to_string())
        });
        let batch = CommitBatch {
            batch_id: Uuid::new_v4(),
            source_checksum: "abc".to_string(),
            first_row: 1,
            records: vec![
                Record::new().with("grand_total", 5),
                Record::new().with("grand_total", -5),
            ],
        };
        let outcomes = sink.commit_batch(&batch).await.unwrap();
        assert_eq!(outcomes[0], RecordOutcome::Committed);
        assert_eq!(outcomes[1], RecordOutcome::Rejected("negative total".into()));
        assert_eq!(sink.committed().await.len(), 1);
        assert_eq!(sink.batches().await.len(), 1);
    }
}
