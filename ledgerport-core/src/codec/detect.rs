//! Format detection
//!
//! Extension first, then binary signature, then the first non-empty line of
//! text, then csv. A `.csv` file holding JSON is still csv.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::domain::FileFormat;

/// How a format was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Extension,
    Signature,
    Content,
    /// Nothing matched; csv was assumed
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub format: FileFormat,
    pub method: DetectionMethod,
}

impl Detection {
    pub fn is_ambiguous(&self) -> bool {
        self.method == DetectionMethod::Fallback
    }
}

const PDF_SIGNATURE: [u8; 4] = [0x25, 0x50, 0x44, 0x46];
const OLE_SIGNATURE: [u8; 4] = [0xd0, 0xcf, 0x11, 0xe0];
const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Classify a file by name and content
pub fn detect(filename: &str, bytes: &[u8]) -> Detection {
    let detection = by_extension(filename)
        .map(|format| Detection {
            format,
            method: DetectionMethod::Extension,
        })
        .or_else(|| {
            by_signature(bytes).map(|format| Detection {
                format,
                method: DetectionMethod::Signature,
            })
        })
        .or_else(|| {
            by_content(bytes).map(|format| Detection {
                format,
                method: DetectionMethod::Content,
            })
        })
        .unwrap_or(Detection {
            format: FileFormat::Csv,
            method: DetectionMethod::Fallback,
        });

    debug!(
        filename,
        format = %detection.format,
        method = ?detection.method,
        "detected file format"
    );
    detection
}

fn by_extension(filename: &str) -> Option<FileFormat> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FileFormat::from_extension)
}

fn by_signature(bytes: &[u8]) -> Option<FileFormat> {
    let head = bytes.get(..4)?;
    if head == PDF_SIGNATURE {
        Some(FileFormat::Pdf)
    } else if head == OLE_SIGNATURE || head == ZIP_SIGNATURE {
        // xlsx is a zip container; a bare zip upload is treated the same way
        Some(FileFormat::Excel)
    } else {
        None
    }
}

fn by_content(bytes: &[u8]) -> Option<FileFormat> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;

    if line.contains(',') {
        Some(FileFormat::Csv)
    } else if line.starts_with('{') || line.starts_with('[') {
        Some(FileFormat::Json)
    } else if line.starts_with("!Type:") {
        Some(FileFormat::Qif)
    } else if line.starts_with("<OFX") {
        Some(FileFormat::Ofx)
    } else if line.starts_with("<?xml") {
        if text.contains("<OFX") {
            Some(FileFormat::Ofx)
        } else {
            Some(FileFormat::Xml)
        }
    } else {
        None
    }
}
