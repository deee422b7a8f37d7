//! Export command - filter and serialize a JSON array of records

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use ledgerport_core::codec::{self, Attachment};
use ledgerport_core::domain::{DateRange, ExportFilters};
use ledgerport_core::services::export::format_estimate;
use ledgerport_core::FileFormat;

use super::{get_context, show_progress};
use crate::output;

#[derive(Args)]
pub struct ExportArgs {
    /// JSON file holding an array of records
    records: PathBuf,
    /// Output format (csv, excel, json, pdf, zip)
    #[arg(long, short)]
    format: Option<FileFormat>,
    /// Output path; defaults to export_<date>.<ext> in the current directory
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Fields to include, in order
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
    /// Earliest purchase date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Latest purchase date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Keep records in any of these categories
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Keep records with any of these tags
    #[arg(long = "tag")]
    tags: Vec<String>,
    /// Keep records with one of these statuses
    #[arg(long)]
    status: Vec<String>,
    /// Keep records containing this text
    #[arg(long)]
    search: Option<String>,
    /// Export template to start from
    #[arg(long)]
    template: Option<String>,
    /// Encrypt zip entries with this password
    #[arg(long, env = "LEDGERPORT_EXPORT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Files to bundle into zip exports
    #[arg(long = "attach")]
    attachments: Vec<PathBuf>,
    /// Save this configuration as a template with the given name
    #[arg(long)]
    save_template: Option<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl ExportArgs {
    fn filters(&self) -> ExportFilters {
        let date_range = (self.from.is_some() || self.to.is_some()).then_some(DateRange {
            start: self.from,
            end: self.to,
        });
        ExportFilters {
            date_range,
            categories: self.categories.clone(),
            tags: self.tags.clone(),
            status: self.status.clone(),
            search: self.search.clone(),
        }
    }

    fn has_filters(&self) -> bool {
        !self.filters().is_empty()
    }
}

pub async fn run(args: ExportArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.records)
        .with_context(|| format!("Failed to read {:?}", args.records))?;
    let records = codec::json::parse(&text).context("Records file must hold a JSON array of objects")?;

    let ctx = get_context(None)?;
    let mut pipeline = ctx.export_pipeline();

    if let Some(id) = &args.template {
        pipeline.apply_template(id).await?;
    }
    if let Some(format) = args.format {
        pipeline.set_format(format)?;
    }
    if !args.fields.is_empty() {
        pipeline.set_fields(args.fields.clone())?;
    }
    if args.has_filters() {
        pipeline.set_filters(args.filters())?;
    }

    let mut options = pipeline.session().options;
    if args.password.is_some() {
        options.password = true;
    }
    if !args.attachments.is_empty() {
        options.include_attachments = true;
    }
    pipeline.set_options(options)?;
    pipeline.set_password(args.password.clone())?;
    for path in &args.attachments {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        pipeline.add_attachment(Attachment { name, bytes })?;
    }

    pipeline.start_export(records)?;
    if !args.json {
        if let Some(handle) = pipeline.progress_handle() {
            show_progress(handle, "Exporting").await;
        }
    }
    let result = pipeline.wait().await?.clone();

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&result.artifact.filename));
    std::fs::write(&path, &result.artifact.bytes)
        .with_context(|| format!("Failed to write {:?}", path))?;

    let saved = match &args.save_template {
        Some(name) => Some(pipeline.save_as_template(name, None).await?),
        None => None,
    };

    if args.json {
        let mut out = serde_json::to_value(&result)?;
        out["path"] = serde_json::Value::String(path.display().to_string());
        if let Some(template) = &saved {
            out["savedTemplateId"] = serde_json::Value::String(template.id.clone());
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "Export complete".green().bold());
    println!("  File:      {}", path.display());
    println!("  Format:    {}", result.artifact.format.display_name());
    println!("  Records:   {}", result.record_count);
    println!(
        "  Size:      {} (estimated {})",
        format_estimate(result.file_size as f64),
        result.estimated_size
    );
    for filter in &result.filter_summary {
        println!("  Filter:    {}", filter);
    }
    if let Some(template) = saved {
        output::success(&format!("Saved template '{}' ({})", template.name, template.id));
    }
    Ok(())
}
