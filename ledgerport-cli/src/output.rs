//! Terminal rendering for sessions, records and mappings

use colored::{ColoredString, Colorize};
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use ledgerport_core::{FieldMapping, Record, TargetSchema};

/// Widest cell shown in a record preview
const MAX_CELL_CHARS: usize = 40;

fn status(mark: ColoredString, msg: &str) -> String {
    format!("{} {}", mark, msg)
}

pub fn success(msg: &str) {
    println!("{}", status("✓".green().bold(), msg));
}

/// Errors go to stderr
pub fn error(msg: &str) {
    eprintln!("{}", status("✗".red().bold(), &msg.red().to_string()));
}

pub fn warning(msg: &str) {
    println!("{}", status("!".yellow().bold(), &msg.yellow().to_string()));
}

pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Condensed table with the given header
pub fn table<S: ToString>(header: &[S]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(ToString::to_string).collect::<Vec<_>>());
    table
}

fn cell(text: String) -> String {
    if text.chars().count() <= MAX_CELL_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(MAX_CELL_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

/// One row per record, one column per field in `columns`
pub fn records_table(columns: &[String], records: &[Record]) -> Table {
    let mut table = table(columns);
    for record in records {
        table.add_row(
            columns
                .iter()
                .map(|c| cell(record.get(c).map(ToString::to_string).unwrap_or_default()))
                .collect::<Vec<_>>(),
        );
    }
    table
}

/// Source fields next to the label of the target they feed
pub fn mapping_table(mapping: &FieldMapping, schema: &TargetSchema) -> Table {
    let mut table = table(&["Source field", "Target field"][..]);
    for source in mapping.sources() {
        let target = match mapping.target_of(source) {
            Some(id) => schema.label_of(id).to_string(),
            None => "(not imported)".dimmed().to_string(),
        };
        table.add_row(vec![source.to_string(), target]);
    }
    table
}
