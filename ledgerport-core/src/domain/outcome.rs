//! Run summaries and commit payloads

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::format::FileFormat;
use super::record::Record;

/// One batch of mapped records handed to the commit backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitBatch {
    pub batch_id: Uuid,
    /// SHA-256 of the source file, hex encoded
    pub source_checksum: String,
    /// 1-indexed row number of the first record in this batch
    pub first_row: usize,
    pub records: Vec<Record>,
}

/// Backend verdict for a single committed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum RecordOutcome {
    Committed,
    CommittedWithWarning(String),
    Rejected(String),
}

/// Summary of a completed import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub total_records: usize,
    pub successful_records: usize,
    pub failed_records: usize,
    pub warnings: usize,
    pub errors: Vec<String>,
}

impl ImportResult {
    pub fn is_success(&self) -> bool {
        self.failed_records == 0
    }

    /// At most `limit` errors, followed by an "and N more" line when truncated
    pub fn display_errors(&self, limit: usize) -> Vec<String> {
        let mut shown: Vec<String> = self.errors.iter().take(limit).cloned().collect();
        if self.errors.len() > limit {
            shown.push(format!("... and {} more", self.errors.len() - limit));
        }
        shown
    }
}

/// Downloadable export payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub filename: String,
    pub mime_type: String,
    pub format: FileFormat,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// `data:` URL suitable for a browser download link
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Summary of a completed export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub artifact: ExportArtifact,
    pub record_count: usize,
    pub file_size: usize,
    /// Heuristic size shown before download, e.g. "3 KB"
    pub estimated_size: String,
    pub date_summary: String,
    pub filter_summary: Vec<String>,
}
