//! Detect command - report a file's format

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use ledgerport_core::codec;
use serde_json::json;

use super::read_source;

pub fn run(file: &Path, json: bool) -> Result<()> {
    let source = read_source(file)?;
    let detection = codec::detect(&source.name, &source.bytes);

    if json {
        let out = json!({
            "file": source.name,
            "format": detection.format,
            "method": detection.method,
            "mimeType": detection.format.mime_type(),
            "importable": detection.format.supports_import(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}: {}", source.name.bold(), detection.format.display_name());
    println!("  Detected by: {:?}", detection.method);
    println!("  MIME type:   {}", detection.format.mime_type());
    if detection.is_ambiguous() {
        println!("  {}", "No signature matched; assuming CSV".yellow());
    }
    if !detection.format.supports_import() {
        println!("  {}", "This format cannot be imported".yellow());
    }
    Ok(())
}
