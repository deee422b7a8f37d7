//! Import command - run a file through mapping, validation and commit

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use ledgerport_core::domain::DateFormat;
use ledgerport_core::Error;

use super::{get_context, read_source, show_progress};
use crate::output;

#[derive(Args)]
pub struct ImportArgs {
    /// File to import
    file: PathBuf,
    /// Import template to apply (see `lport templates list`)
    #[arg(long)]
    template: Option<String>,
    /// Map a source field to a target field; an empty target skips the field
    #[arg(long = "map", value_name = "SOURCE=TARGET")]
    mappings: Vec<String>,
    /// Date format of the file, e.g. "MM/DD/YYYY"
    #[arg(long)]
    date_format: Option<String>,
    /// Decimal separator
    #[arg(long)]
    decimal_separator: Option<char>,
    /// Thousands separator
    #[arg(long)]
    thousands_separator: Option<char>,
    /// Lines to skip before the header
    #[arg(long)]
    skip_lines: Option<usize>,
    /// NDJSON file receiving committed records when no backend is configured
    #[arg(long)]
    output: Option<PathBuf>,
    /// Stop after validation and show the mapped preview
    #[arg(long)]
    dry_run: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

fn parse_mapping(raw: &str) -> Result<(String, Option<String>)> {
    let (source, target) = raw
        .split_once('=')
        .with_context(|| format!("Invalid mapping '{}', expected SOURCE=TARGET", raw))?;
    let target = target.trim();
    Ok((
        source.trim().to_string(),
        (!target.is_empty()).then(|| target.to_string()),
    ))
}

pub async fn run(args: ImportArgs) -> Result<()> {
    let ctx = get_context(args.output.clone())?;
    let mut pipeline = ctx.import_pipeline();

    pipeline.select_files(vec![read_source(&args.file)?])?;

    if let Some(id) = &args.template {
        pipeline.apply_template(id).await?;
    }

    let mut settings = pipeline.session().settings.clone();
    if let Some(label) = &args.date_format {
        settings.date_format = DateFormat::from_label(label).with_context(|| {
            let known: Vec<&str> = DateFormat::ALL.iter().map(|f| f.label()).collect();
            format!("Unknown date format '{}'; expected one of: {}", label, known.join(", "))
        })?;
    }
    if let Some(c) = args.decimal_separator {
        settings.decimal_separator = c;
    }
    if let Some(c) = args.thousands_separator {
        settings.thousands_separator = c;
    }
    if let Some(n) = args.skip_lines {
        settings.skip_lines = n;
    }
    if settings != pipeline.session().settings {
        pipeline.update_settings(settings)?;
    }

    for raw in &args.mappings {
        let (source, target) = parse_mapping(raw)?;
        if !pipeline.session().source_fields.contains(&source) {
            bail!("Field '{}' is not in the file", source);
        }
        pipeline.set_field_mapping(&source, target.as_deref())?;
    }

    let report = match pipeline.continue_to_validation() {
        Ok(report) => report.clone(),
        Err(Error::Mapping(issues)) => {
            for issue in &issues {
                output::error(&format!("  {}", issue));
            }
            bail!("Mapping is incomplete");
        }
        Err(e) => return Err(e.into()),
    };

    let session = pipeline.session();
    if args.dry_run {
        if args.json {
            let out = serde_json::json!({
                "mapping": session.mapping,
                "validation": report,
                "preview": session.mapped_preview,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            let columns: Vec<String> = session.mapping.mapped().map(|(_, t)| t.to_string()).collect();
            println!("{}", output::records_table(&columns, &session.mapped_preview));
            print_issues(&report.errors());
            if report.valid {
                output::success("Validation passed (dry run, nothing imported)");
            }
        }
        return Ok(());
    }

    if !report.valid {
        print_issues(&report.errors());
        bail!("Validation failed; fix the mapping or the file and try again");
    }

    pipeline.start_import()?;
    if !args.json {
        if let Some(handle) = pipeline.progress_handle() {
            show_progress(handle, "Importing").await;
        }
    }
    let result = pipeline.wait().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{}", "Import complete".green().bold());
    println!("  Total:     {}", result.total_records);
    println!("  Imported:  {}", result.successful_records);
    if result.warnings > 0 {
        println!("  Warnings:  {}", result.warnings.to_string().yellow());
    }
    if result.failed_records > 0 {
        println!("  Failed:    {}", result.failed_records.to_string().red());
        for line in result.display_errors(10) {
            output::warning(&format!("    {}", line));
        }
    }
    Ok(())
}

fn print_issues(errors: &[String]) {
    for line in errors {
        output::warning(&format!("  {}", line));
    }
}
