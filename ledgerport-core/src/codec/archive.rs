//! ZIP bundle export
//!
//! Holds the records as CSV and JSON, a manifest, and any attachments under
//! `attachments/`. Entries are AES-256 encrypted when a password is given.

use std::io::{Cursor, Write};

use serde::Serialize;
use zip::write::{FileOptions, SimpleFileOptions};
use zip::{AesMode, CompressionMethod, ZipWriter};

use super::{delimited, header_of, json, SerializeOptions};
use crate::domain::result::{Error, Result};
use crate::domain::Record;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    record_count: usize,
    fields: Vec<String>,
    generated_at: String,
    files: Vec<&'a str>,
    attachments: Vec<&'a str>,
}

pub fn serialize(records: &[Record], options: &SerializeOptions) -> Result<Vec<u8>> {
    let stem = if options.stem.is_empty() { "export" } else { options.stem.as_str() };
    let csv_name = format!("{}.csv", stem);
    let json_name = format!("{}.json", stem);
    let attachment_names: Vec<String> = options
        .attachments
        .iter()
        .map(|a| format!("attachments/{}", a.name))
        .collect();

    let manifest = Manifest {
        record_count: records.len(),
        fields: header_of(records),
        generated_at: chrono::Utc::now().to_rfc3339(),
        files: vec![csv_name.as_str(), json_name.as_str()],
        attachments: attachment_names.iter().map(String::as_str).collect(),
    };

    let method = if options.compress {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };
    let base = SimpleFileOptions::default().compression_method(method);
    let entry_options: FileOptions<'_, ()> = match options.password.as_deref() {
        Some(password) if !password.is_empty() => base.with_aes_encryption(AesMode::Aes256, password),
        _ => base,
    };

    let mut entries: Vec<(&str, Vec<u8>)> = vec![
        (csv_name.as_str(), delimited::serialize(records)?),
        (json_name.as_str(), json::serialize(records)?),
        ("manifest.json", serde_json::to_vec_pretty(&manifest)?),
    ];
    for (name, attachment) in attachment_names.iter().zip(&options.attachments) {
        entries.push((name.as_str(), attachment.bytes.clone()));
    }

    let zip_err = |e: zip::result::ZipError| Error::serialize(format!("Failed to build archive: {}", e));
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in &entries {
        zip.start_file(*name, entry_options).map_err(zip_err)?;
        zip.write_all(bytes)?;
    }
    Ok(zip.finish().map_err(zip_err)?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Attachment;
    use std::io::Read;
    use zip::ZipArchive;

    fn records() -> Vec<Record> {
        vec![Record::new().with("merchant_name", "Acme").with("grand_total", 5)]
    }

    #[test]
    fn test_bundle_contents() {
        let options = SerializeOptions {
            stem: "export_2024-01-31".to_string(),
            attachments: vec![Attachment {
                name: "receipt.txt".to_string(),
                bytes: b"paid".to_vec(),
            }],
            compress: true,
            ..Default::default()
        };
        let bytes = serialize(&records(), &options).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        assert!(names.contains(&"export_2024-01-31.csv".to_string()));
        assert!(names.contains(&"export_2024-01-31.json".to_string()));
        assert!(names.contains(&"manifest.json".to_string()));
        assert!(names.contains(&"attachments/receipt.txt".to_string()));

        let mut csv = String::new();
        archive
            .by_name("export_2024-01-31.csv")
            .unwrap()
            .read_to_string(&mut csv)
            .unwrap();
        assert_eq!(csv, "merchant_name,grand_total\nAcme,5\n");

        let mut manifest = String::new();
        archive.by_name("manifest.json").unwrap().read_to_string(&mut manifest).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(manifest["recordCount"], 1);
    }

    #[test]
    fn test_password_encrypts_entries() {
        let options = SerializeOptions {
            password: Some("s3cret".to_string()),
            compress: false,
            ..Default::default()
        };
        let bytes = serialize(&records(), &options).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.by_name("export.csv").is_err());

        let mut csv = String::new();
        archive
            .by_name_decrypt("export.csv", b"s3cret")
            .unwrap()
            .read_to_string(&mut csv)
            .unwrap();
        assert!(csv.starts_with("merchant_name"));
    }
}
