//! Template store port - named import/export presets

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{Template, TemplateBody, TemplateDraft};

/// Template persistence for one template family.
///
/// The store owns ids and the `createdAt`/`updatedAt` timestamps. Marking a
/// template default clears the flag on other templates of the same format.
/// Concurrent edits are last-write-wins.
#[async_trait]
pub trait TemplateStore<B: TemplateBody>: Send + Sync {
    /// All stored templates, oldest first
    async fn list(&self) -> Result<Vec<Template<B>>>;

    /// Get a template by id
    async fn get(&self, id: &str) -> Result<Option<Template<B>>>;

    /// Store a new template
    async fn create(&self, draft: TemplateDraft<B>) -> Result<Template<B>>;

    /// Replace a template's content, keeping its id and creation time
    async fn update(&self, id: &str, draft: TemplateDraft<B>) -> Result<Template<B>>;

    /// Delete a template
    async fn delete(&self, id: &str) -> Result<()>;

    /// Make a template the default for its format
    async fn set_default(&self, id: &str) -> Result<Template<B>>;
}
