//! Supported file formats and their static metadata

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// File format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Excel,
    Json,
    Xml,
    Qif,
    Ofx,
    Pdf,
    Zip,
}

impl FileFormat {
    pub const ALL: [FileFormat; 8] = [
        Self::Csv,
        Self::Excel,
        Self::Json,
        Self::Xml,
        Self::Qif,
        Self::Ofx,
        Self::Pdf,
        Self::Zip,
    ];

    /// Short lowercase identifier, as used in settings and templates
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Qif => "qif",
            Self::Ofx => "ofx",
            Self::Pdf => "pdf",
            Self::Zip => "zip",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Csv => "CSV (Comma-Separated Values)",
            Self::Excel => "Excel Spreadsheet",
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Qif => "QIF (Quicken Interchange Format)",
            Self::Ofx => "OFX (Open Financial Exchange)",
            Self::Pdf => "PDF Document",
            Self::Zip => "ZIP Archive",
        }
    }

    /// Canonical file extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Excel => "xlsx",
            other => other.as_str(),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::Qif => "application/qif",
            Self::Ofx => "application/ofx",
            Self::Pdf => "application/pdf",
            Self::Zip => "application/zip",
        }
    }

    pub fn supports_import(&self) -> bool {
        matches!(
            self,
            Self::Csv | Self::Excel | Self::Json | Self::Qif | Self::Ofx
        )
    }

    pub fn supports_export(&self) -> bool {
        matches!(
            self,
            Self::Csv | Self::Excel | Self::Json | Self::Pdf | Self::Zip
        )
    }

    /// Look a format up by file extension (case-insensitive, leading dot optional)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" => Some(Self::Excel),
            "json" => Some(Self::Json),
            "pdf" => Some(Self::Pdf),
            "qif" => Some(Self::Qif),
            "ofx" => Some(Self::Ofx),
            "xml" => Some(Self::Xml),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == lower)
            .or_else(|| Self::from_extension(&lower))
            .ok_or_else(|| format!("Unknown format: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excel_uses_xlsx_extension() {
        assert_eq!(FileFormat::Excel.extension(), "xlsx");
        assert_eq!(FileFormat::Csv.extension(), "csv");
    }

    #[test]
    fn test_import_export_support() {
        assert!(FileFormat::Qif.supports_import());
        assert!(!FileFormat::Qif.supports_export());
        assert!(FileFormat::Pdf.supports_export());
        assert!(!FileFormat::Pdf.supports_import());
        assert!(FileFormat::Csv.supports_import() && FileFormat::Csv.supports_export());
        assert!(!FileFormat::Xml.supports_import() && !FileFormat::Xml.supports_export());
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(FileFormat::from_extension(".XLS"), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_extension("ofx"), Some(FileFormat::Ofx));
        assert_eq!(FileFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_parse_from_str() {
        assert_eq!("excel".parse::<FileFormat>(), Ok(FileFormat::Excel));
        assert_eq!("xlsx".parse::<FileFormat>(), Ok(FileFormat::Excel));
        assert!("docx".parse::<FileFormat>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&FileFormat::Ofx).unwrap();
        assert_eq!(json, "\"ofx\"");
    }
}
