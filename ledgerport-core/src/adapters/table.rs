//! Template bookkeeping shared by the local stores

use chrono::Utc;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Template, TemplateBody, TemplateDraft};

fn not_found<B: TemplateBody>(id: &str) -> Error {
    Error::not_found(format!("{} template {}", B::KIND.as_str(), id))
}

/// Keep at most one default per format: the template at `keep`
fn clear_other_defaults<B>(templates: &mut [Template<B>], keep: usize) {
    let format = templates[keep].format;
    for (idx, t) in templates.iter_mut().enumerate() {
        if idx != keep && t.format == format {
            t.is_default = false;
        }
    }
}

pub(crate) fn create<B: TemplateBody>(templates: &mut Vec<Template<B>>, draft: TemplateDraft<B>) -> Template<B> {
    let template = draft.into_template(Uuid::new_v4().to_string(), Utc::now());
    templates.push(template.clone());
    if template.is_default {
        let last = templates.len() - 1;
        clear_other_defaults(templates, last);
    }
    template
}

pub(crate) fn update<B: TemplateBody>(
    templates: &mut [Template<B>],
    id: &str,
    draft: TemplateDraft<B>,
) -> Result<Template<B>> {
    let idx = templates
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| not_found::<B>(id))?;
    let existing = &templates[idx];
    let updated = Template {
        id: existing.id.clone(),
        created_at: existing.created_at,
        updated_at: Utc::now(),
        name: draft.name,
        description: draft.description,
        format: draft.format,
        is_default: draft.is_default,
        body: draft.body,
    };
    templates[idx] = updated.clone();
    if updated.is_default {
        clear_other_defaults(templates, idx);
    }
    Ok(updated)
}

pub(crate) fn delete<B: TemplateBody>(templates: &mut Vec<Template<B>>, id: &str) -> Result<()> {
    let before = templates.len();
    templates.retain(|t| t.id != id);
    if templates.len() == before {
        return Err(not_found::<B>(id));
    }
    Ok(())
}

pub(crate) fn set_default<B: TemplateBody>(templates: &mut [Template<B>], id: &str) -> Result<Template<B>> {
    let idx = templates
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| not_found::<B>(id))?;
    templates[idx].is_default = true;
    templates[idx].updated_at = Utc::now();
    clear_other_defaults(templates, idx);
    Ok(templates[idx].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExportSpec, FileFormat};

    fn draft(name: &str, format: FileFormat, is_default: bool) -> TemplateDraft<ExportSpec> {
        TemplateDraft {
            name: name.into(),
            description: None,
            format,
            is_default,
            body: ExportSpec::default(),
        }
    }

    #[test]
    fn test_create_default_takes_over_format() {
        let mut templates = Vec::new();
        create(&mut templates, draft("A", FileFormat::Csv, true));
        create(&mut templates, draft("P", FileFormat::Pdf, true));
        let b = create(&mut templates, draft("B", FileFormat::Csv, true));

        let defaults: Vec<_> = templates.iter().filter(|t| t.is_default).map(|t| t.name.as_str()).collect();
        assert_eq!(defaults, vec!["P", "B"]);
        assert!(templates.last().is_some_and(|t| t.id == b.id));
    }
}
