//! Preview command - parse a file and show the suggested mapping

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::{get_context, read_source};
use crate::output;

pub fn run(file: &Path, rows: Option<usize>, json: bool) -> Result<()> {
    let mut ctx = get_context(None)?;
    if let Some(rows) = rows {
        ctx.config.engine.preview_rows = rows;
    }
    let mut pipeline = ctx.import_pipeline();
    pipeline.select_files(vec![read_source(file)?])?;
    let session = pipeline.session();

    if json {
        let out = json!({
            "detection": session.detection,
            "totalRecords": session.records.len(),
            "fields": session.source_fields,
            "preview": session.preview,
            "mapping": session.mapping,
            "suggestedTemplates": session.suggested_templates,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if let Some(detection) = session.detection {
        output::info(&format!(
            "{} - {} records",
            detection.format.display_name(),
            session.records.len()
        ));
    }
    println!("{}", output::records_table(&session.source_fields, &session.preview));

    println!();
    println!("{}", "Suggested mapping".bold());
    println!("{}", output::mapping_table(&session.mapping, &ctx.schema));

    if !session.suggested_templates.is_empty() {
        println!();
        println!("{}", "Matching templates".bold());
        for suggestion in &session.suggested_templates {
            println!("  {} ({})", suggestion.name, suggestion.template_id);
        }
    }
    Ok(())
}
