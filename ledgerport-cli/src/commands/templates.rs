//! Templates command - manage import and export templates

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::Confirm;
use ledgerport_core::services::templates::BuiltinTemplates;
use ledgerport_core::services::TemplateCatalog;

use super::get_context;
use crate::output;

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    Import,
    Export,
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List templates
    List {
        #[arg(long, value_enum, default_value = "import")]
        kind: Kind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one template
    Show {
        id: String,
        #[arg(long, value_enum, default_value = "import")]
        kind: Kind,
    },
    /// Delete a stored template
    Delete {
        id: String,
        #[arg(long, value_enum, default_value = "import")]
        kind: Kind,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Make a template the default for its format
    Default {
        id: String,
        #[arg(long, value_enum, default_value = "import")]
        kind: Kind,
    },
    /// Write a template as shareable JSON
    Export {
        id: String,
        #[arg(long, value_enum, default_value = "import")]
        kind: Kind,
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Store a template from shared JSON
    Import {
        file: PathBuf,
        #[arg(long, value_enum, default_value = "import")]
        kind: Kind,
    },
}

pub async fn run(command: TemplateCommands) -> Result<()> {
    let ctx = get_context(None)?;
    let templates = &ctx.templates;
    match command {
        TemplateCommands::List { kind, json } => match kind {
            Kind::Import => list(&templates.import, json).await,
            Kind::Export => list(&templates.export, json).await,
        },
        TemplateCommands::Show { id, kind } => {
            let text = match kind {
                Kind::Import => templates.import.export_to_json(&id).await?,
                Kind::Export => templates.export.export_to_json(&id).await?,
            };
            println!("{}", text);
            Ok(())
        }
        TemplateCommands::Delete { id, kind, force } => {
            if !force
                && !Confirm::new()
                    .with_prompt(format!("Delete template '{}'?", id))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }
            match kind {
                Kind::Import => templates.import.delete(&id).await?,
                Kind::Export => templates.export.delete(&id).await?,
            }
            output::success(&format!("Deleted template '{}'", id));
            Ok(())
        }
        TemplateCommands::Default { id, kind } => {
            let (name, format) = match kind {
                Kind::Import => {
                    let t = templates.import.set_default(&id).await?;
                    (t.name, t.format)
                }
                Kind::Export => {
                    let t = templates.export.set_default(&id).await?;
                    (t.name, t.format)
                }
            };
            output::success(&format!("'{}' is now the default {} template", name, format));
            Ok(())
        }
        TemplateCommands::Export { id, kind, output: path } => {
            let text = match kind {
                Kind::Import => templates.import.export_to_json(&id).await?,
                Kind::Export => templates.export.export_to_json(&id).await?,
            };
            match path {
                Some(path) => {
                    std::fs::write(&path, text).with_context(|| format!("Failed to write {:?}", path))?;
                    output::success(&format!("Wrote {}", path.display()));
                }
                None => println!("{}", text),
            }
            Ok(())
        }
        TemplateCommands::Import { file, kind } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let (id, name) = match kind {
                Kind::Import => {
                    let t = templates.import.import_from_json(&text).await?;
                    (t.id, t.name)
                }
                Kind::Export => {
                    let t = templates.export.import_from_json(&text).await?;
                    (t.id, t.name)
                }
            };
            output::success(&format!("Imported template '{}' ({})", name, id));
            Ok(())
        }
    }
}

async fn list<B: BuiltinTemplates>(catalog: &TemplateCatalog<B>, json: bool) -> Result<()> {
    let all = catalog.list().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }
    if all.is_empty() {
        println!("No templates found.");
        return Ok(());
    }

    let mut table = output::table(&["ID", "Name", "Format", "Default", "Updated"][..]);
    for t in all {
        let id = if TemplateCatalog::<B>::is_builtin(&t.id) {
            format!("{} {}", t.id, "(built-in)".dimmed())
        } else {
            t.id.clone()
        };
        table.add_row(vec![
            id,
            t.name,
            t.format.to_string(),
            if t.is_default { "yes".to_string() } else { String::new() },
            t.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}
