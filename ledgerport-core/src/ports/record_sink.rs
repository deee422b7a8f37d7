//! Record sink port - where imported records are committed

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{CommitBatch, RecordOutcome};

/// Commit backend for imported records.
///
/// Returns one outcome per record, in batch order. `Err` means the whole
/// batch failed to reach the backend; the import carries on with the next
/// batch and counts every record of this one as failed.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn commit_batch(&self, batch: &CommitBatch) -> Result<Vec<RecordOutcome>>;
}
