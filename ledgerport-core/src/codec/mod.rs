//! Codec layer - per-format parse and serialize
//!
//! Every parser returns records that share one set of field names. Every
//! serializer rejects an empty record set.

pub mod archive;
pub mod delimited;
pub mod detect;
pub mod json;
pub mod ofx;
pub mod pdf;
pub mod qif;
pub mod spreadsheet;
mod text;

use crate::domain::result::{Error, Result};
use crate::domain::{Encoding, FileFormat, Record};

pub use detect::{detect, Detection, DetectionMethod};
pub use text::decode_text;

pub const NO_DATA: &str = "No data available for export.";

/// Parse-time settings that affect how raw bytes are read
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub encoding: Encoding,
    /// Leading lines (rows for spreadsheets) dropped before the header
    pub skip_lines: usize,
}

/// A file bundled into zip exports under `attachments/`
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Document title for formats that carry one
    pub title: String,
    /// Base name for entries inside archives
    pub stem: String,
    pub attachments: Vec<Attachment>,
    pub password: Option<String>,
    pub compress: bool,
}

/// Parse a whole file into records
pub fn parse(format: FileFormat, bytes: &[u8], options: &ParseOptions) -> Result<Vec<Record>> {
    match format {
        FileFormat::Csv => delimited::parse(&decode_text(bytes, options.encoding)?, options.skip_lines),
        FileFormat::Excel => spreadsheet::parse(bytes, options.skip_lines),
        FileFormat::Json => json::parse(&decode_text(bytes, options.encoding)?),
        FileFormat::Qif => qif::parse(&decode_text(bytes, options.encoding)?),
        FileFormat::Ofx => ofx::parse(&decode_text(bytes, options.encoding)?),
        other => Err(Error::parse(format!("Unsupported import format: {}", other))),
    }
}

/// Serialize records into the bytes of a file
pub fn serialize(format: FileFormat, records: &[Record], options: &SerializeOptions) -> Result<Vec<u8>> {
    if records.is_empty() {
        return Err(Error::serialize(NO_DATA));
    }
    match format {
        FileFormat::Csv => delimited::serialize(records),
        FileFormat::Excel => spreadsheet::serialize(records),
        FileFormat::Json => json::serialize(records),
        FileFormat::Pdf => pdf::serialize(records, &options.title),
        FileFormat::Zip => archive::serialize(records, options),
        other => Err(Error::serialize(format!("Unsupported export format: {}", other))),
    }
}

/// Field names of the first record, which serializers use as the header
pub(crate) fn header_of(records: &[Record]) -> Vec<String> {
    let header: Vec<String> = records
        .first()
        .map(|r| r.keys().map(String::from).collect())
        .unwrap_or_default();
    if let Some(idx) = records.iter().position(|r| !r.has_same_keys(&records[0])) {
        tracing::warn!(
            row = idx + 1,
            columns = header.len(),
            "records have differing fields; using the first record's fields as header"
        );
    }
    header
}
